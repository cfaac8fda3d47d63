use crate::config::AppConfig;
use crate::pb::coordinator::coordinator_server::Coordinator;
use crate::pb::coordinator::{EmbedRequest, EmbedResponse};
use crate::queue::PendingQueue;
use crate::types::{ClientResponse, PendingEntry};
use log::warn;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tonic::{Request, Response, Status};

/// The public, client-facing `Embed` RPC. Validates, enqueues, and suspends
/// until the batcher/dispatcher pipeline fulfills the caller's sink (or the
/// admission timeout expires).
pub struct CoordinatorService {
    config: Arc<AppConfig>,
    queue: Arc<PendingQueue>,
    admission_timeout: Duration,
}

impl CoordinatorService {
    pub fn new(config: Arc<AppConfig>, queue: Arc<PendingQueue>) -> Self {
        let admission_timeout = config.admission_timeout();
        Self {
            config,
            queue,
            admission_timeout,
        }
    }

    /// Overrides the admission timeout, bypassing `config`'s (generous, real)
    /// one. Lets tests exercise the timeout branch without actually waiting
    /// on `max_batch_wait() + 30s`.
    #[cfg(test)]
    fn with_admission_timeout(
        config: Arc<AppConfig>,
        queue: Arc<PendingQueue>,
        admission_timeout: Duration,
    ) -> Self {
        Self {
            config,
            queue,
            admission_timeout,
        }
    }
}

#[tonic::async_trait]
impl Coordinator for CoordinatorService {
    async fn embed(
        &self,
        request: Request<EmbedRequest>,
    ) -> Result<Response<EmbedResponse>, Status> {
        let texts = request.into_inner().texts;

        if texts.is_empty() {
            return Err(Status::invalid_argument("`texts` can't be empty"));
        }
        if texts.len() > self.config.max_batch_size {
            return Err(Status::invalid_argument(format!(
                "`texts` can't contain more than {} entries",
                self.config.max_batch_size
            )));
        }

        metrics::counter!("coordinator_request_count").increment(1);

        let (response_sender, response_receiver) = oneshot::channel();
        let entry = PendingEntry::new(texts, response_sender);

        if self.queue.try_push_back(entry).await.is_err() {
            metrics::counter!("coordinator_queue_full_count").increment(1);
            return Err(Status::resource_exhausted("pending queue is full"));
        }

        match tokio::time::timeout(self.admission_timeout, response_receiver).await {
            Ok(Ok(response)) => Ok(Response::new(response.into())),
            Ok(Err(_)) => {
                warn!("embed: sink dropped without a response");
                Err(Status::internal("response channel closed"))
            }
            Err(_) => {
                metrics::counter!("coordinator_request_timeout_count").increment(1);
                Ok(Response::new(
                    ClientResponse::error("request timed out", Vec::new()).into(),
                ))
            }
        }
    }
}
