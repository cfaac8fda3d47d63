use parking_lot::RwLock;
use std::net::IpAddr;

/// The authoritative set of worker IPs, published wholesale by the resolver
/// loop. Single writer (resolver), multiple readers (health loop, picker,
/// dispatch-pool sizing). Readers take a snapshot rather than holding the
/// lock across any further work, so the lock is never held across an
/// `.await`.
#[derive(Default)]
pub struct WorkerSet {
    ips: RwLock<Vec<IpAddr>>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self {
            ips: RwLock::new(Vec::new()),
        }
    }

    /// Replaces the published set, deduplicated, in resolver-returned order.
    /// Returns `true` if the set actually changed.
    pub fn replace(&self, mut ips: Vec<IpAddr>) -> bool {
        ips.sort();
        ips.dedup();
        let mut guard = self.ips.write();
        if *guard == ips {
            return false;
        }
        *guard = ips;
        true
    }

    pub fn snapshot(&self) -> Vec<IpAddr> {
        self.ips.read().clone()
    }

    pub fn len(&self) -> usize {
        self.ips.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.read().is_empty()
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.ips.read().contains(ip)
    }
}
