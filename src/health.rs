use crate::pb::worker::HealthStatus as WireHealthStatus;
use crate::worker_client::WorkerClient;
use crate::worker_set::WorkerSet;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Health state for a single `WorkerEntry`. Transitions are driven entirely
/// by the health loop's probe results (`UNKNOWN -> OK|DEGRADED|UNAVAILABLE`,
/// and any state -> `UNAVAILABLE` on probe failure). Removal from the set
/// happens when the resolver stops publishing the IP, not via a state
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Health {
    Unknown,
    Ok,
    Degraded,
    Unavailable,
}

impl From<WireHealthStatus> for Health {
    fn from(status: WireHealthStatus) -> Self {
        match status {
            WireHealthStatus::StatusOk => Health::Ok,
            WireHealthStatus::StatusDegraded => Health::Degraded,
            WireHealthStatus::StatusUnavailable => Health::Unavailable,
        }
    }
}

/// Worker-health map: single writer per entry (the health loop, one entry
/// per probed IP per sweep), readers are the picker. Protected by one lock;
/// no iterator is ever handed out that outlives the lock.
#[derive(Default)]
pub struct HealthMap {
    inner: RwLock<HashMap<IpAddr, Health>>,
}

impl HealthMap {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, ip: IpAddr, health: Health) {
        self.inner.write().insert(ip, health);
    }

    pub fn get(&self, ip: &IpAddr) -> Health {
        self.inner
            .read()
            .get(ip)
            .copied()
            .unwrap_or(Health::Unknown)
    }

    /// Drops entries for IPs no longer in the published set. Called at the
    /// start of each health sweep, before probing.
    pub fn retain_only(&self, live: &[IpAddr]) {
        let mut guard = self.inner.write();
        guard.retain(|ip, _| live.contains(ip));
    }
}

/// Probes a single worker's self-reported health. Abstracted so the health
/// loop can be exercised in tests without a real worker on the wire.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, ip: IpAddr, deadline: Duration) -> Health;
}

/// Issues a real `Heartbeat` RPC; any transport failure counts as
/// UNAVAILABLE, per §4.G.
pub struct GrpcProbe {
    pub worker_port: u16,
}

#[async_trait::async_trait]
impl Probe for GrpcProbe {
    async fn probe(&self, ip: IpAddr, deadline: Duration) -> Health {
        let client = WorkerClient::new(ip, self.worker_port);
        match client.heartbeat(deadline).await {
            Ok(response) => Health::from(response.status()),
            Err(err) => {
                log::warn!("health: heartbeat to {ip} failed: {err}");
                Health::Unavailable
            }
        }
    }
}

/// Periodic health sweep: before each sweep, drop entries for IPs no longer
/// published; probe every currently-published IP concurrently; record each
/// result. The next sweep starts at least `interval` after this one started.
pub async fn run_health_loop(
    probe: Arc<dyn Probe>,
    worker_set: Arc<WorkerSet>,
    health_map: Arc<HealthMap>,
    interval: Duration,
    deadline: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let ips = worker_set.snapshot();
        health_map.retain_only(&ips);

        let probes = ips.into_iter().map(|ip| {
            let probe = probe.clone();
            let health_map = health_map.clone();
            async move {
                let health = probe.probe(ip, deadline).await;
                health_map.set(ip, health);
            }
        });
        futures::future::join_all(probes).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(n: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, n])
    }

    #[test]
    fn unknown_is_the_default_for_unseen_ips() {
        let map = HealthMap::new();
        assert_eq!(map.get(&ip(1)), Health::Unknown);
    }

    #[test]
    fn set_then_get_roundtrips() {
        let map = HealthMap::new();
        map.set(ip(1), Health::Degraded);
        assert_eq!(map.get(&ip(1)), Health::Degraded);
    }

    #[test]
    fn retain_only_drops_entries_for_departed_ips() {
        let map = HealthMap::new();
        map.set(ip(1), Health::Ok);
        map.set(ip(2), Health::Ok);
        map.retain_only(&[ip(1)]);

        assert_eq!(map.get(&ip(1)), Health::Ok);
        assert_eq!(map.get(&ip(2)), Health::Unknown);
    }

    struct FakeProbe {
        result: Health,
    }

    #[async_trait::async_trait]
    impl Probe for FakeProbe {
        async fn probe(&self, _ip: IpAddr, _deadline: Duration) -> Health {
            self.result
        }
    }

    #[tokio::test]
    async fn sweep_records_probe_result_for_every_published_ip() {
        let worker_set = Arc::new(WorkerSet::new());
        worker_set.replace(vec![ip(1), ip(2)]);
        let health_map = Arc::new(HealthMap::new());
        let probe: Arc<dyn Probe> = Arc::new(FakeProbe { result: Health::Ok });

        let handle = tokio::spawn(run_health_loop(
            probe,
            worker_set,
            health_map.clone(),
            Duration::from_millis(5),
            Duration::from_secs(1),
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();

        assert_eq!(health_map.get(&ip(1)), Health::Ok);
        assert_eq!(health_map.get(&ip(2)), Health::Ok);
    }

    #[tokio::test]
    async fn sweep_drops_health_for_ips_no_longer_published() {
        let worker_set = Arc::new(WorkerSet::new());
        worker_set.replace(vec![ip(1)]);
        let health_map = Arc::new(HealthMap::new());
        health_map.set(ip(2), Health::Ok);
        let probe: Arc<dyn Probe> = Arc::new(FakeProbe { result: Health::Ok });

        let handle = tokio::spawn(run_health_loop(
            probe,
            worker_set,
            health_map.clone(),
            Duration::from_millis(5),
            Duration::from_secs(1),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();

        assert_eq!(health_map.get(&ip(2)), Health::Unknown);
    }
}
