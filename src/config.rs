use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Port the coordinator's gRPC service listens on
    #[arg(long)]
    pub coordinator_port: Option<u16>,

    /// Port the Prometheus scrape endpoint listens on
    #[arg(long)]
    pub metrics_port: Option<u16>,

    /// Maximum texts per inference batch / per accepted client batch
    #[arg(long)]
    pub max_batch_size: Option<usize>,

    /// Batcher's adaptive fill budget, in milliseconds
    #[arg(long)]
    pub max_batch_wait_ms: Option<u64>,

    /// Pending-queue capacity
    #[arg(long)]
    pub max_queue_size: Option<usize>,

    /// Concurrent in-flight dispatch ceiling, per healthy worker
    #[arg(long)]
    pub max_inflight_batches_mult: Option<usize>,

    /// Dispatcher attempts beyond the first, on transport failure
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Hostname resolved to the set of worker IPs
    #[arg(long)]
    pub worker_service_name: Option<String>,

    /// Port each embedding worker's gRPC service listens on
    #[arg(long)]
    pub worker_port: Option<u16>,

    /// How often the worker set is re-resolved, in seconds
    #[arg(long)]
    pub resolve_interval_secs: Option<u64>,

    /// How often each worker is health-probed, in seconds
    #[arg(long)]
    pub health_interval_secs: Option<u64>,

    /// Per-heartbeat RPC deadline, in seconds
    #[arg(long)]
    pub heartbeat_timeout_secs: Option<u64>,

    /// Logging filter (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub coordinator_port: u16,
    pub metrics_port: u16,
    pub max_batch_size: usize,
    pub max_batch_wait_ms: u64,
    pub max_queue_size: usize,
    pub max_inflight_batches_mult: usize,
    pub max_retries: u32,
    pub worker_service_name: String,
    pub worker_port: u16,
    pub resolve_interval_secs: u64,
    pub health_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            coordinator_port: 50050,
            metrics_port: 8000,
            max_batch_size: 20,
            max_batch_wait_ms: 10,
            max_queue_size: 250,
            max_inflight_batches_mult: 4,
            max_retries: 3,
            worker_service_name: "worker".to_string(),
            worker_port: 50051,
            resolve_interval_secs: 10,
            health_interval_secs: 5,
            heartbeat_timeout_secs: 2,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Build config from CLI args layered onto defaults
    pub fn build(args: Option<Args>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(args) = args {
            if let Some(coordinator_port) = args.coordinator_port {
                config.coordinator_port = coordinator_port;
            }
            if let Some(metrics_port) = args.metrics_port {
                config.metrics_port = metrics_port;
            }
            if let Some(max_batch_size) = args.max_batch_size {
                if max_batch_size == 0 {
                    return Err(ConfigError::MustBePositive { field: "max_batch_size" });
                }
                config.max_batch_size = max_batch_size;
            }
            if let Some(max_batch_wait_ms) = args.max_batch_wait_ms {
                if max_batch_wait_ms == 0 {
                    return Err(ConfigError::MustBePositive { field: "max_batch_wait_ms" });
                }
                config.max_batch_wait_ms = max_batch_wait_ms;
            }
            if let Some(max_queue_size) = args.max_queue_size {
                if max_queue_size == 0 {
                    return Err(ConfigError::MustBePositive { field: "max_queue_size" });
                }
                config.max_queue_size = max_queue_size;
            }
            if let Some(max_inflight_batches_mult) = args.max_inflight_batches_mult {
                config.max_inflight_batches_mult = max_inflight_batches_mult;
            }
            if let Some(max_retries) = args.max_retries {
                config.max_retries = max_retries;
            }
            if let Some(worker_service_name) = args.worker_service_name {
                config.worker_service_name = worker_service_name;
            }
            if let Some(worker_port) = args.worker_port {
                config.worker_port = worker_port;
            }
            if let Some(resolve_interval_secs) = args.resolve_interval_secs {
                config.resolve_interval_secs = resolve_interval_secs;
            }
            if let Some(health_interval_secs) = args.health_interval_secs {
                config.health_interval_secs = health_interval_secs;
            }
            if let Some(heartbeat_timeout_secs) = args.heartbeat_timeout_secs {
                config.heartbeat_timeout_secs = heartbeat_timeout_secs;
            }
            if let Some(log_level) = args.log_level {
                config.log_level = log_level.to_lowercase();
            }
        }
        Ok(config)
    }

    pub fn max_batch_wait(&self) -> Duration {
        Duration::from_millis(self.max_batch_wait_ms)
    }

    pub fn resolve_interval(&self) -> Duration {
        Duration::from_secs(self.resolve_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Dispatch retry backoff for a given attempt: 0.1 * (attempt + 1) seconds
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(100 * (attempt as u64 + 1))
    }

    /// Upper bound an admission call may wait on its sink before giving up.
    /// Generous slack beyond the batcher's own fill budget covers one full
    /// dispatch round trip (picker + RPC + retries).
    pub fn admission_timeout(&self) -> Duration {
        self.max_batch_wait() + Duration::from_secs(30)
    }

    /// Initialize logging from `log_level`, honoring `RUST_LOG` if already set.
    pub fn init_logging(&self) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&self.log_level))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> Args {
        Args {
            coordinator_port: None,
            metrics_port: None,
            max_batch_size: None,
            max_batch_wait_ms: None,
            max_queue_size: None,
            max_inflight_batches_mult: None,
            max_retries: None,
            worker_service_name: None,
            worker_port: None,
            resolve_interval_secs: None,
            health_interval_secs: None,
            heartbeat_timeout_secs: None,
            log_level: None,
        }
    }

    #[test]
    fn build_from_default() {
        let config = AppConfig::build(None).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.coordinator_port, defaults.coordinator_port);
        assert_eq!(config.max_batch_size, defaults.max_batch_size);
        assert_eq!(config.max_inflight_batches_mult, defaults.max_inflight_batches_mult);
    }

    #[test]
    fn build_from_partial_args() {
        let args = Args {
            max_batch_size: Some(64),
            worker_port: Some(9999),
            ..empty_args()
        };
        let config = AppConfig::build(Some(args)).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.max_batch_size, 64);
        assert_eq!(config.worker_port, 9999);
        assert_eq!(config.max_queue_size, defaults.max_queue_size);
    }

    #[test]
    fn build_fails_when_max_batch_size_is_zero() {
        let args = Args {
            max_batch_size: Some(0),
            ..empty_args()
        };
        assert!(AppConfig::build(Some(args)).is_err());
    }

    #[test]
    fn build_fails_when_max_batch_wait_ms_is_zero() {
        let args = Args {
            max_batch_wait_ms: Some(0),
            ..empty_args()
        };
        assert!(AppConfig::build(Some(args)).is_err());
    }

    #[test]
    fn retry_backoff_scales_with_attempt() {
        let config = AppConfig::default();
        assert_eq!(config.retry_backoff(0), Duration::from_millis(100));
        assert_eq!(config.retry_backoff(2), Duration::from_millis(300));
    }
}
