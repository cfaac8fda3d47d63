use crate::pb::coordinator::{Embedding, EmbedResponse, ReturnCode};
use std::time::Instant;
use tokio::sync::oneshot;

/// The one-shot rendezvous a suspended `Embed` call waits on. Fulfilling an
/// already-fulfilled (or abandoned) sink is a no-op: `oneshot::Sender::send`
/// returns `Err` once its `Receiver` has been dropped, and callers here
/// always discard that `Err`.
pub type ResultSink = oneshot::Sender<ClientResponse>;
pub type ResultReceiver = oneshot::Receiver<ClientResponse>;

/// The shape fulfilling a `ResultSink`.
#[derive(Debug, Clone)]
pub struct ClientResponse {
    pub ok: bool,
    pub return_msg: String,
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

impl ClientResponse {
    pub fn ok(ids: Vec<String>, embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            ok: true,
            return_msg: String::new(),
            ids,
            embeddings,
        }
    }

    pub fn error(return_msg: impl Into<String>, ids: Vec<String>) -> Self {
        Self {
            ok: false,
            return_msg: return_msg.into(),
            ids,
            embeddings: Vec::new(),
        }
    }
}

impl From<ClientResponse> for EmbedResponse {
    fn from(resp: ClientResponse) -> Self {
        EmbedResponse {
            ids: resp.ids,
            embeddings: resp
                .embeddings
                .into_iter()
                .map(|vector| Embedding { vector })
                .collect(),
            code: if resp.ok {
                ReturnCode::Ok as i32
            } else {
                ReturnCode::Error as i32
            },
            return_msg: resp.return_msg,
        }
    }
}

/// A validated client batch waiting to be folded into an inference batch.
#[derive(Debug)]
pub struct PendingEntry {
    pub texts: Vec<String>,
    pub response_sender: ResultSink,
    pub received_at: Instant,
}

impl PendingEntry {
    pub fn new(texts: Vec<String>, response_sender: ResultSink) -> Self {
        Self {
            texts,
            response_sender,
            received_at: Instant::now(),
        }
    }
}

/// One (sink, count) pair in an `InferenceBatch`'s sidecar: `count` texts
/// starting at this entry's offset belong to this sink.
pub struct SidecarEntry {
    pub sink: ResultSink,
    pub count: usize,
}

/// A coalesced batch of texts from one or more `PendingEntry`s, ready to be
/// sent to a worker in a single `Infer` call.
#[derive(Default)]
pub struct InferenceBatch {
    pub texts: Vec<String>,
    pub ids: Vec<String>,
    pub sidecar: Vec<SidecarEntry>,
}

impl InferenceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Fold one pending entry's texts into this batch, assigning fresh IDs.
    pub fn absorb(&mut self, entry: PendingEntry) {
        let count = entry.texts.len();
        self.ids.extend(crate::ids::generate_ids(count));
        self.texts.extend(entry.texts);
        self.sidecar.push(SidecarEntry {
            sink: entry.response_sender,
            count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_appends_texts_and_matching_sidecar_count() {
        let mut batch = InferenceBatch::new();
        let (tx, _rx) = oneshot::channel();
        batch.absorb(PendingEntry::new(vec!["a".into(), "b".into()], tx));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ids.len(), 2);
        assert_eq!(batch.sidecar.len(), 1);
        assert_eq!(batch.sidecar[0].count, 2);
    }

    #[test]
    fn sidecar_counts_sum_to_total_text_count() {
        let mut batch = InferenceBatch::new();
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        batch.absorb(PendingEntry::new(vec!["a".into()], tx1));
        batch.absorb(PendingEntry::new(vec!["b".into(), "c".into(), "d".into()], tx2));

        let sum: usize = batch.sidecar.iter().map(|s| s.count).sum();
        assert_eq!(sum, batch.len());
    }

    #[test]
    fn client_response_error_has_no_embeddings() {
        let resp = ClientResponse::error("boom", vec!["id1".into()]);
        assert!(!resp.ok);
        assert!(resp.embeddings.is_empty());
        assert_eq!(resp.ids, vec!["id1".to_string()]);
    }
}
