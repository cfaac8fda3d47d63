use parking_lot::Mutex;
use tokio::sync::Notify;

struct State {
    inflight: usize,
    threshold: usize,
}

/// A counting semaphore whose threshold is retuned at runtime as the
/// worker set changes. Not a plain `tokio::sync::Semaphore`: permits can't
/// simply be minted or forgotten from outside, because the threshold can
/// shrink below the number of permits already checked out. `acquire`,
/// `release` and `set_threshold` all go through the same mutex, so they are
/// mutually exclusive; `set_threshold` wakes every waiter so newly-eligible
/// ones can recheck.
pub struct DispatchPool {
    state: Mutex<State>,
    notify: Notify,
}

impl DispatchPool {
    pub fn new(initial_threshold: usize) -> Self {
        Self {
            state: Mutex::new(State {
                inflight: 0,
                threshold: initial_threshold,
            }),
            notify: Notify::new(),
        }
    }

    /// Suspends until `inflight < threshold`, then increments `inflight`.
    pub async fn acquire(&self) {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock();
                if state.inflight < state.threshold {
                    state.inflight += 1;
                    return;
                }
            }
            notified.await;
        }
    }

    /// Decrements `inflight` (never below zero) and wakes waiters.
    pub fn release(&self) {
        {
            let mut state = self.state.lock();
            state.inflight = state.inflight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Replaces the threshold and wakes every waiter so any newly-eligible
    /// one can proceed. A threshold of 0 blocks all new dispatches.
    pub fn set_threshold(&self, threshold: usize) {
        {
            let mut state = self.state.lock();
            state.threshold = threshold;
        }
        self.notify.notify_waiters();
    }

    pub fn threshold(&self) -> usize {
        self.state.lock().threshold
    }

    pub fn inflight(&self) -> usize {
        self.state.lock().inflight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_succeeds_under_threshold() {
        let pool = DispatchPool::new(2);
        pool.acquire().await;
        pool.acquire().await;
        assert_eq!(pool.inflight(), 2);
    }

    #[tokio::test]
    async fn acquire_blocks_at_threshold_until_release() {
        let pool = Arc::new(DispatchPool::new(1));
        pool.acquire().await;

        let pool2 = pool.clone();
        let handle = tokio::spawn(async move {
            pool2.acquire().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        pool.release();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("acquire should unblock after release")
            .unwrap();
    }

    #[tokio::test]
    async fn set_threshold_wakes_waiters() {
        let pool = Arc::new(DispatchPool::new(1));
        pool.acquire().await;

        let pool2 = pool.clone();
        let handle = tokio::spawn(async move {
            pool2.acquire().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.set_threshold(2);

        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("acquire should unblock after threshold increase")
            .unwrap();
        assert_eq!(pool.inflight(), 2);
    }

    #[tokio::test]
    async fn release_never_goes_below_zero() {
        let pool = DispatchPool::new(4);
        pool.release();
        pool.release();
        assert_eq!(pool.inflight(), 0);
    }

    #[tokio::test]
    async fn zero_threshold_blocks_new_dispatches() {
        let pool = Arc::new(DispatchPool::new(0));
        let pool2 = pool.clone();
        let handle = tokio::spawn(async move {
            pool2.acquire().await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
