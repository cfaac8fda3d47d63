use crate::dispatch_pool::DispatchPool;
use crate::worker_set::WorkerSet;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time;

/// Name-resolution callback abstraction over the out-of-scope service
/// discovery system: hostname in, set of worker IPs out. The default
/// implementation resolves through the host's DNS via Tokio; tests supply
/// a fake.
#[async_trait::async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, name: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolves `name:0` through the async system resolver. The port is a
/// placeholder required by `ToSocketAddrs`; only the IPs are used.
pub struct DnsResolver;

#[async_trait::async_trait]
impl Resolve for DnsResolver {
    async fn resolve(&self, name: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((name, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Periodically resolves `WORKER_SERVICE_NAME` and publishes the result,
/// retuning the dispatch pool's threshold after every successful
/// resolution. Failures are logged and the previous set is retained.
pub async fn run_resolver_loop(
    resolver: Arc<dyn Resolve>,
    service_name: String,
    interval: std::time::Duration,
    inflight_mult: usize,
    worker_set: Arc<WorkerSet>,
    dispatch_pool: Arc<DispatchPool>,
) {
    let mut ticker = time::interval(interval);
    loop {
        ticker.tick().await;
        match resolver.resolve(&service_name).await {
            Ok(ips) => {
                let count = {
                    worker_set.replace(ips);
                    worker_set.len()
                };
                log::info!("resolver: published {count} worker ip(s) for '{service_name}'");
                metrics::gauge!("coordinator_worker_count").set(count as f64);
                dispatch_pool.set_threshold(count * inflight_mult);
            }
            Err(err) => {
                log::warn!("resolver: failed to resolve '{service_name}': {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FakeResolver {
        ips: Vec<IpAddr>,
    }

    #[async_trait::async_trait]
    impl Resolve for FakeResolver {
        async fn resolve(&self, _name: &str) -> std::io::Result<Vec<IpAddr>> {
            Ok(self.ips.clone())
        }
    }

    #[tokio::test]
    async fn publishes_set_and_updates_threshold() {
        let worker_set = Arc::new(WorkerSet::new());
        let dispatch_pool = Arc::new(DispatchPool::new(0));
        let resolver: Arc<dyn Resolve> = Arc::new(FakeResolver {
            ips: vec![IpAddr::from([10, 0, 0, 1]), IpAddr::from([10, 0, 0, 2])],
        });

        let loop_handle = tokio::spawn(run_resolver_loop(
            resolver,
            "worker".to_string(),
            Duration::from_millis(5),
            4,
            worker_set.clone(),
            dispatch_pool.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        loop_handle.abort();

        assert_eq!(worker_set.len(), 2);
        assert_eq!(dispatch_pool.threshold(), 8);
    }

    #[tokio::test]
    async fn identical_set_leaves_threshold_unchanged() {
        let worker_set = Arc::new(WorkerSet::new());
        let dispatch_pool = Arc::new(DispatchPool::new(0));
        let resolver: Arc<dyn Resolve> = Arc::new(FakeResolver {
            ips: vec![IpAddr::from([10, 0, 0, 1])],
        });

        let loop_handle = tokio::spawn(run_resolver_loop(
            resolver,
            "worker".to_string(),
            Duration::from_millis(5),
            4,
            worker_set.clone(),
            dispatch_pool.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        loop_handle.abort();

        assert_eq!(dispatch_pool.threshold(), 4);
    }
}
