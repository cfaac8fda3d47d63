use clap::Parser;
use embedding_coordinator::config::{AppConfig, Args};
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::build(Some(args)).unwrap_or_else(|err| {
        eprintln!("Configuration error: {err}");
        std::process::exit(1);
    });

    config.init_logging();

    info!("starting embedding coordinator");
    info!("coordinator_port: {}", config.coordinator_port);
    info!("metrics_port: {}", config.metrics_port);
    info!(
        "max_batch_size: {}, max_batch_wait_ms: {}, max_queue_size: {}",
        config.max_batch_size, config.max_batch_wait_ms, config.max_queue_size
    );
    info!(
        "worker_service_name: {}, worker_port: {}, max_inflight_batches_mult: {}",
        config.worker_service_name, config.worker_port, config.max_inflight_batches_mult
    );

    embedding_coordinator::run(config).await
}
