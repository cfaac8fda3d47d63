use crate::error::TransportError;
use crate::pb::worker::worker_client::WorkerClient as GeneratedWorkerClient;
use crate::pb::worker::{HeartbeatRequest, HeartbeatResponse, InferRequest, InferResponse};
use std::net::IpAddr;
use std::time::Duration;
use tonic::transport::Channel;
use tonic::Request;

/// Thin wrapper around the generated gRPC client for one worker. A fresh
/// channel is opened per dispatch attempt, mirroring "open transport channel
/// to addr" in the dispatcher algorithm: workers are stateless and short
/// connection lifetimes keep this simple, at the cost of reconnect latency
/// the design explicitly accepts (dispatches are short-lived; see §4.D).
pub struct WorkerClient {
    addr: String,
}

impl WorkerClient {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self {
            addr: format!("http://{ip}:{port}"),
        }
    }

    async fn connect(&self) -> Result<GeneratedWorkerClient<Channel>, TransportError> {
        let channel = Channel::from_shared(self.addr.clone())
            .expect("worker address is a valid URI")
            .connect()
            .await
            .map_err(|source| TransportError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        Ok(GeneratedWorkerClient::new(channel))
    }

    pub async fn infer(&self, texts: Vec<String>, ids: Vec<String>) -> Result<InferResponse, TransportError> {
        let mut client = self.connect().await?;
        let request = Request::new(InferRequest {
            input_data: texts,
            ids,
        });
        let response = client
            .infer(request)
            .await
            .map_err(|source| TransportError::Rpc {
                addr: self.addr.clone(),
                source,
            })?;
        Ok(response.into_inner())
    }

    pub async fn heartbeat(&self, deadline: Duration) -> Result<HeartbeatResponse, TransportError> {
        let mut client = self.connect().await?;
        let mut request = Request::new(HeartbeatRequest {});
        request.set_timeout(deadline);

        // `Request::set_timeout` only sets the `grpc-timeout` metadata header;
        // it asks the server to abandon the call past `deadline`, but does
        // nothing to make the client give up locally if the server never
        // replies at all. Wrap the call in `tokio::time::timeout` so a worker
        // that accepts the connection and then hangs doesn't block the
        // health sweep forever.
        let response = tokio::time::timeout(deadline, client.heartbeat(request))
            .await
            .map_err(|_| TransportError::Timeout {
                addr: self.addr.clone(),
                deadline,
            })?
            .map_err(|source| TransportError::Rpc {
                addr: self.addr.clone(),
                source,
            })?;
        Ok(response.into_inner())
    }
}

/// Abstraction over "call `Infer` against one worker", mirroring `Probe`'s
/// trait-object shape so the dispatcher's retry loop can be driven against a
/// fake in tests instead of a real connection.
#[async_trait::async_trait]
pub trait WorkerCall: Send + Sync {
    async fn infer(
        &self,
        ip: IpAddr,
        port: u16,
        texts: Vec<String>,
        ids: Vec<String>,
    ) -> Result<InferResponse, TransportError>;
}

/// Issues a real `Infer` RPC, opening a fresh `WorkerClient` (and thus a
/// fresh channel) per call.
pub struct GrpcWorkerCall;

#[async_trait::async_trait]
impl WorkerCall for GrpcWorkerCall {
    async fn infer(
        &self,
        ip: IpAddr,
        port: u16,
        texts: Vec<String>,
        ids: Vec<String>,
    ) -> Result<InferResponse, TransportError> {
        WorkerClient::new(ip, port).infer(texts, ids).await
    }
}
