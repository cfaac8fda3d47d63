use crate::config::AppConfig;
use crate::error::DispatchError;
use crate::picker::Picker;
use crate::pb::worker::InferCode;
use crate::types::{ClientResponse, InferenceBatch, SidecarEntry};
use crate::worker_client::WorkerCall;
use log::{info, warn};
use std::sync::Arc;

/// Drives one `InferenceBatch` to completion: pick a worker, call `Infer`,
/// retry on transport failure, then fan the result back out to every
/// originating client's sink. Runs as its own spawned task; the caller is
/// responsible for releasing the dispatch-pool permit once this returns.
pub async fn dispatch(
    config: Arc<AppConfig>,
    picker: Arc<Picker>,
    worker_call: Arc<dyn WorkerCall>,
    batch: InferenceBatch,
) -> Result<(), DispatchError> {
    let InferenceBatch { texts, ids, sidecar } = batch;
    let total = texts.len();

    if picker.is_empty() {
        fulfill_all_with_error(sidecar, &ids, DispatchError::NoWorkers.client_message());
        return Err(DispatchError::NoWorkers);
    }

    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        let ip = match picker.next() {
            Some(ip) => ip,
            None => {
                warn!("dispatcher: no workers published, attempt {attempt}");
                tokio::time::sleep(config.retry_backoff(attempt)).await;
                continue;
            }
        };

        match worker_call
            .infer(ip, config.worker_port, texts.clone(), ids.clone())
            .await
        {
            Ok(response) => {
                fulfill(response, &ids, sidecar);
                return Ok(());
            }
            Err(err) => {
                warn!("dispatcher: infer attempt {attempt} against {ip} failed: {err}");
                last_err = Some(err);
                tokio::time::sleep(config.retry_backoff(attempt)).await;
            }
        }
    }

    let err = match last_err {
        Some(transport_err) => DispatchError::Transport(transport_err),
        None => DispatchError::RetriesExhausted,
    };
    info!("dispatcher: exhausted retries for batch of {total} text(s): {err}");
    fulfill_all_with_error(sidecar, &ids, err.client_message());
    Err(err)
}

/// Slices `response`'s ids/embeddings by the sidecar's per-client counts and
/// fulfills each sink. Any structural mismatch (wrong code, or a length
/// mismatch on success) fulfills every sink in the batch with an error
/// instead, each scoped to its own slice of request ids.
fn fulfill(
    response: crate::pb::worker::InferResponse,
    request_ids: &[String],
    sidecar: Vec<SidecarEntry>,
) {
    if response.code() != InferCode::Ok {
        warn!("dispatcher: worker {} returned {:?}: {}", response.worker_id, response.code(), response.return_msg);
        fulfill_all_with_error(sidecar, request_ids, "error processing request");
        return;
    }

    if response.embeddings.len() != request_ids.len() {
        warn!(
            "dispatcher: worker {} returned {} embedding(s) for {} id(s)",
            response.worker_id,
            response.embeddings.len(),
            request_ids.len()
        );
        fulfill_all_with_error(sidecar, request_ids, "error processing result");
        return;
    }

    let mut offset = 0;
    for entry in sidecar {
        let end = offset + entry.count;
        let ids_slice = request_ids[offset..end].to_vec();
        let embeddings_slice = response.embeddings[offset..end]
            .iter()
            .map(|e| e.vector.clone())
            .collect();
        let _ = entry.sink.send(ClientResponse::ok(ids_slice, embeddings_slice));
        offset = end;
    }
}

fn fulfill_all_with_error(sidecar: Vec<SidecarEntry>, request_ids: &[String], message: &str) {
    let mut offset = 0;
    for entry in sidecar {
        let end = offset + entry.count;
        let ids_slice = request_ids[offset..end].to_vec();
        let _ = entry.sink.send(ClientResponse::error(message, ids_slice));
        offset = end;
    }
}
