use crate::queue::PendingQueue;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Installs the Prometheus recorder and starts its scrape HTTP listener on
/// `port`. Must be called once, before any `metrics::counter!`/`gauge!` call
/// records a value.
pub fn install_recorder(port: u16) -> Result<(), anyhow::Error> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    Ok(())
}

/// Periodically samples the pending queue's length into
/// `coordinator_queue_size`, per the gauge's 2-second sampling cadence.
pub async fn run_queue_size_sampler(queue: Arc<PendingQueue>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        ticker.tick().await;
        let size = queue.len().await;
        metrics::gauge!("coordinator_queue_size").set(size as f64);
    }
}
