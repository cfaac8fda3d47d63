use thiserror::Error;

/// Errors raised while resolving startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be > 0")]
    MustBePositive { field: &'static str },
}

/// Errors raised while talking to a single embedding worker over gRPC.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to worker at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("rpc to worker at {addr} failed: {source}")]
    Rpc {
        addr: String,
        #[source]
        source: tonic::Status,
    },
    #[error("call to worker at {addr} did not complete within {deadline:?}")]
    Timeout { addr: String, deadline: std::time::Duration },
}

/// Errors surfaced while driving one inference batch through the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no workers are currently published")]
    NoWorkers,
    #[error("max retries exceeded")]
    RetriesExhausted,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// The message returned to every sink in the failed batch. All three
    /// variants collapse to the same client-facing string: the caller
    /// already got the detail via `log::warn!`/`Display` at the call site.
    pub fn client_message(&self) -> &'static str {
        match self {
            DispatchError::NoWorkers => "max retries exceeded",
            DispatchError::RetriesExhausted => "max retries exceeded",
            DispatchError::Transport(_) => "max retries exceeded",
        }
    }
}
