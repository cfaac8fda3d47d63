use crate::config::AppConfig;
use crate::dispatch_pool::DispatchPool;
use crate::dispatcher;
use crate::picker::Picker;
use crate::queue::PendingQueue;
use crate::types::{InferenceBatch, PendingEntry};
use crate::worker_client::WorkerCall;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Single task draining the pending queue into `InferenceBatch`es.
///
/// Each batch is seeded by the first entry popped, then grown under an
/// adaptive wait: `W = MAX_BATCH_WAIT * T / MAX_BATCH_SIZE`, so an
/// almost-empty batch waits close to the full budget and an almost-full one
/// waits close to zero. An entry that would overflow MAX_BATCH_SIZE is
/// pushed back to the head of the queue rather than dropped, and the batch
/// closes without it.
pub async fn run_batcher_loop(
    config: Arc<AppConfig>,
    queue: Arc<PendingQueue>,
    dispatch_pool: Arc<DispatchPool>,
    picker: Arc<Picker>,
    worker_call: Arc<dyn WorkerCall>,
) {
    loop {
        let entry = queue.pop_front().await;
        let batch = build_batch(&config, &queue, entry).await;

        if batch.is_empty() {
            // Can't happen via admission (n >= 1 is enforced there), but
            // guard against it rather than dispatching nothing.
            warn!("batcher: built an empty batch, skipping");
            continue;
        }

        debug!(
            "batcher: dispatching batch of {} text(s) from {} client(s)",
            batch.len(),
            batch.sidecar.len()
        );

        dispatch_pool.acquire().await;

        let dispatch_pool = dispatch_pool.clone();
        let picker = picker.clone();
        let config = config.clone();
        let worker_call = worker_call.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatcher::dispatch(config, picker, worker_call, batch).await {
                debug!("batcher: dispatch failed: {err}");
            }
            dispatch_pool.release();
        });
    }
}

async fn build_batch(
    config: &AppConfig,
    queue: &PendingQueue,
    first: PendingEntry,
) -> InferenceBatch {
    let mut batch = InferenceBatch::new();
    let t0 = Instant::now();
    batch.absorb(first);

    while batch.len() < config.max_batch_size {
        let wait = dynamic_wait(config, batch.len());
        let elapsed = t0.elapsed();
        let remaining = wait.saturating_sub(elapsed);

        match queue.pop_front_timeout(remaining).await {
            None => break,
            Some(entry) => {
                if batch.len() + entry.texts.len() > config.max_batch_size {
                    queue.push_front(entry).await;
                    break;
                }
                batch.absorb(entry);
            }
        }
    }

    info!(
        "batcher: batch closed after {:?}, T={}",
        t0.elapsed(),
        batch.len()
    );
    batch
}

/// `W = MAX_BATCH_WAIT * T / MAX_BATCH_SIZE`, monotone in `T`: the batch
/// never waits longer as it grows.
fn dynamic_wait(config: &AppConfig, current_len: usize) -> Duration {
    let max_wait = config.max_batch_wait();
    (max_wait * current_len as u32) / config.max_batch_size as u32
}
