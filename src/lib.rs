pub mod batcher;
pub mod config;
pub mod dispatch_pool;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod ids;
pub mod metrics;
pub mod pb;
pub mod picker;
pub mod queue;
pub mod resolver;
pub mod service;
pub mod types;
pub mod worker_client;
pub mod worker_set;

use crate::config::AppConfig;
use crate::dispatch_pool::DispatchPool;
use crate::health::{GrpcProbe, HealthMap, Probe};
use crate::pb::coordinator::coordinator_server::CoordinatorServer;
use crate::picker::Picker;
use crate::queue::PendingQueue;
use crate::resolver::{DnsResolver, Resolve};
use crate::service::CoordinatorService;
use crate::worker_client::{GrpcWorkerCall, WorkerCall};
use crate::worker_set::WorkerSet;
use log::info;
use std::sync::Arc;
use tonic::transport::Server;

/// Wires up the whole pipeline and serves the `Coordinator` gRPC service
/// until a termination signal arrives.
///
/// Background loops (resolver, health, batcher, metrics sampler) are
/// spawned as independent tasks; only the gRPC server is awaited directly,
/// so shutdown is driven by the server's own graceful-shutdown future.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let config = Arc::new(config);

    metrics::install_recorder(config.metrics_port)?;

    let queue = Arc::new(PendingQueue::new(config.max_queue_size));
    let dispatch_pool = Arc::new(DispatchPool::new(0));
    let worker_set = Arc::new(WorkerSet::new());
    let health_map = Arc::new(HealthMap::new());
    let picker = Arc::new(Picker::new(worker_set.clone(), health_map.clone()));

    let resolver: Arc<dyn Resolve> = Arc::new(DnsResolver);
    tokio::spawn(resolver::run_resolver_loop(
        resolver,
        config.worker_service_name.clone(),
        config.resolve_interval(),
        config.max_inflight_batches_mult,
        worker_set.clone(),
        dispatch_pool.clone(),
    ));

    let probe: Arc<dyn Probe> = Arc::new(GrpcProbe {
        worker_port: config.worker_port,
    });
    tokio::spawn(health::run_health_loop(
        probe,
        worker_set.clone(),
        health_map.clone(),
        config.health_interval(),
        config.heartbeat_timeout(),
    ));

    let worker_call: Arc<dyn WorkerCall> = Arc::new(GrpcWorkerCall);
    tokio::spawn(batcher::run_batcher_loop(
        config.clone(),
        queue.clone(),
        dispatch_pool.clone(),
        picker.clone(),
        worker_call,
    ));

    tokio::spawn(metrics::run_queue_size_sampler(queue.clone()));

    let addr = format!("0.0.0.0:{}", config.coordinator_port).parse()?;
    let coordinator_service = CoordinatorService::new(config.clone(), queue.clone());

    info!("coordinator: listening on {addr}");
    Server::builder()
        .add_service(CoordinatorServer::new(coordinator_service))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    info!("coordinator: shutdown complete");
    Ok(())
}

/// Resolves once a termination signal is received. Resolver and health
/// loops are not drained explicitly: they hold no client-facing
/// obligations and are simply dropped with the runtime.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("coordinator: shutdown signal received, draining");
}
