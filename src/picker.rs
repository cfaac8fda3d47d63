use crate::health::{Health, HealthMap};
use crate::worker_set::WorkerSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Round-robin cursor over the current worker set, preferring OK over
/// DEGRADED, skipping UNAVAILABLE only when a better candidate exists. The
/// cursor is owned solely by the picker and advanced only here, so there is
/// no shared mutable cursor to race on from other components.
pub struct Picker {
    worker_set: Arc<WorkerSet>,
    health_map: Arc<HealthMap>,
    cursor: AtomicUsize,
}

impl Picker {
    pub fn new(worker_set: Arc<WorkerSet>, health_map: Arc<HealthMap>) -> Self {
        Self {
            worker_set,
            health_map,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Whether no worker is currently published at all.
    pub fn is_empty(&self) -> bool {
        self.worker_set.is_empty()
    }

    /// Returns `None` only when the worker set is empty. Otherwise always
    /// returns some IP, even an UNAVAILABLE one as a last resort: the caller
    /// (the dispatcher) will fail the RPC and retry against the next pick.
    pub fn next(&self) -> Option<IpAddr> {
        let ips = self.worker_set.snapshot();
        if ips.is_empty() {
            return None;
        }

        let mut degraded_candidate: Option<IpAddr> = None;
        let mut last_candidate = ips[0];

        for _ in 0..ips.len() {
            let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % ips.len();
            let candidate = ips[idx];
            last_candidate = candidate;

            match self.health_map.get(&candidate) {
                Health::Ok => return Some(candidate),
                Health::Degraded if degraded_candidate.is_none() => {
                    degraded_candidate = Some(candidate);
                }
                _ => {}
            }
        }

        degraded_candidate.or(Some(last_candidate))
    }
}
