use crate::types::PendingEntry;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::timeout;

/// Bounded FIFO of `PendingEntry`s, shared between the admission front-end
/// (producer) and the batcher (sole consumer). `push_front` exists only to
/// support the batcher's over-size requeue (see `Batcher::build_batch`) and
/// must never be reached from admission.
pub struct PendingQueue {
    inner: Mutex<VecDeque<PendingEntry>>,
    capacity: usize,
    not_empty: Notify,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Notify::new(),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Non-blocking: fails with the entry handed back if the queue is full.
    /// Admission pre-checks fullness and never retries, so the blocking form
    /// of `put` described in the design is never reached in practice.
    pub async fn try_push_back(&self, entry: PendingEntry) -> Result<(), PendingEntry> {
        let mut guard = self.inner.lock().await;
        if guard.len() >= self.capacity {
            return Err(entry);
        }
        guard.push_back(entry);
        drop(guard);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Used only by the batcher to requeue an entry that would overflow the
    /// batch currently being built. Bypasses the capacity check: the entry
    /// already occupied a slot before the batcher popped it.
    pub async fn push_front(&self, entry: PendingEntry) {
        let mut guard = self.inner.lock().await;
        guard.push_front(entry);
        drop(guard);
        self.not_empty.notify_one();
    }

    /// Blocks until an entry is available.
    pub async fn pop_front(&self) -> PendingEntry {
        loop {
            let notified = self.not_empty.notified();
            {
                let mut guard = self.inner.lock().await;
                if let Some(entry) = guard.pop_front() {
                    return entry;
                }
            }
            notified.await;
        }
    }

    /// Blocks until an entry is available or `duration` elapses.
    pub async fn pop_front_timeout(&self, duration: Duration) -> Option<PendingEntry> {
        timeout(duration, self.pop_front()).await.ok()
    }
}
