use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::board::find_shortest_path;
use crate::config::ProcessorConfig;
use crate::error::KnightError;
use crate::job::{PathResult, Request};
use crate::processor::report::{BatchReport, Outcome};
use crate::store::{ChangeFeed, JobStore};

/// Turns pending requests delivered by the change feed into results.
///
/// Safe to run many times over the same request: a completed request is
/// skipped, and the result write is an upsert. Holds no state shared
/// between requests beyond the store handle.
pub struct Processor {
    store: Arc<dyn JobStore>,
    config: ProcessorConfig,
    permits: Arc<Semaphore>,
}

impl Processor {
    pub fn new(store: Arc<dyn JobStore>, config: ProcessorConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            store,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process one delivered request.
    ///
    /// The result is persisted before the request is marked completed, so a
    /// crash in between leaves the request pending and it is redone.
    pub async fn process_request(&self, delivered: &Request) -> Outcome {
        let request_id = delivered.id.as_str();

        if delivered.is_completed() {
            tracing::debug!(request_id, "Request already completed, skipping");
            return Outcome::AlreadyCompleted;
        }

        // The delivered copy may be stale; the stored one decides.
        let current = match self.store.get_request(request_id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                let err = KnightError::RequestNotFound(request_id.to_string());
                tracing::error!(request_id, error = %err, "Delivered request no longer stored");
                return Outcome::Defect(err);
            }
            Err(e) => {
                tracing::warn!(request_id, error = %e, "Failed to read request");
                return Outcome::from_error(e);
            }
        };
        if current.is_completed() {
            tracing::debug!(request_id, "Stored request already completed, skipping");
            return Outcome::AlreadyCompleted;
        }

        let (start, end) = match current.positions() {
            Ok(positions) => positions,
            Err(e) => {
                tracing::error!(request_id, error = %e, "Stored request failed validation, leaving pending");
                return Outcome::Defect(e);
            }
        };

        let path = match find_shortest_path(start, end) {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(request_id, error = %e, "Path search returned no path");
                return Outcome::from_error(e);
            }
        };

        let result = PathResult::from_request(&current, path);
        let moves = result.number_of_moves;
        if let Err(e) = self.store.upsert_result(result).await {
            tracing::warn!(request_id, error = %e, "Failed to write result");
            return Outcome::from_error(e);
        }

        let mut completed = current;
        completed.complete(Utc::now());
        if let Err(e) = self.store.replace_request(completed).await {
            tracing::warn!(request_id, error = %e, "Failed to mark request completed");
            return Outcome::from_error(e);
        }

        tracing::info!(request_id, start = %start, end = %end, moves, "Request completed");
        Outcome::Completed { moves }
    }

    /// Process every request in a batch concurrently. A failure or panic in
    /// one request does not affect the others.
    pub async fn process_batch(self: &Arc<Self>, requests: Vec<Request>) -> BatchReport {
        let mut report = BatchReport::default();
        let mut tasks = JoinSet::new();

        for request in requests {
            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(request_id = %request.id, error = %e, "Concurrency limiter closed");
                    report.record(&Outcome::Failed(KnightError::Internal(e.to_string())));
                    continue;
                }
            };
            let processor = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                processor.process_request(&request).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Request task panicked");
                    report.record(&Outcome::Failed(KnightError::Internal(e.to_string())));
                }
            }
        }

        report
    }

    /// Delivery loop: read a batch, process it, then acknowledge it.
    ///
    /// A batch with retryable failures is left unacknowledged and redelivered
    /// after a backoff. While the store is unavailable the batch keeps coming
    /// back, with the delay capped at `retry_max_delay_ms`. Any other failure
    /// counts against `max_delivery_attempts`, after which the batch is
    /// acknowledged anyway so later changes are not blocked.
    pub async fn run(self: Arc<Self>, mut feed: ChangeFeed, shutdown: CancellationToken) {
        tracing::info!(lease = feed.lease(), checkpoint = feed.checkpoint(), "Processor started");
        let mut read_failures: u32 = 0;

        loop {
            let batch = match feed.next_batch(&shutdown).await {
                Ok(Some(batch)) => {
                    read_failures = 0;
                    batch
                }
                Ok(None) => break,
                Err(e) => {
                    read_failures = read_failures.saturating_add(1);
                    let delay = self.config.retry_delay(read_failures);
                    tracing::warn!(lease = feed.lease(), error = %e, delay_ms = delay.as_millis() as u64, "Failed to read change feed");
                    if backoff(&shutdown, delay).await {
                        break;
                    }
                    continue;
                }
            };

            tracing::debug!(
                lease = feed.lease(),
                changes = batch.len(),
                attempt = batch.attempt,
                first_sequence = batch.first_sequence,
                last_sequence = batch.last_sequence,
                "Processing change batch"
            );

            let report = self.process_batch(batch.requests.clone()).await;

            if report.should_retry() {
                if report.hit_outage() || batch.attempt < self.config.max_delivery_attempts {
                    let delay = self.config.retry_delay(batch.attempt);
                    tracing::warn!(
                        lease = feed.lease(),
                        attempt = batch.attempt,
                        failed = report.failed,
                        unavailable = report.unavailable,
                        delay_ms = delay.as_millis() as u64,
                        "Batch had failures, will be redelivered"
                    );
                    if backoff(&shutdown, delay).await {
                        break;
                    }
                    continue;
                }
                tracing::error!(
                    lease = feed.lease(),
                    attempt = batch.attempt,
                    failed = report.failed,
                    first_sequence = batch.first_sequence,
                    last_sequence = batch.last_sequence,
                    "Giving up on batch after repeated failures"
                );
            }

            if let Err(e) = feed.ack(&batch).await {
                // Not fatal: the batch comes back and completed requests are skipped.
                tracing::warn!(lease = feed.lease(), error = %e, "Failed to save checkpoint");
                continue;
            }

            tracing::info!(
                lease = feed.lease(),
                completed = report.completed,
                skipped = report.skipped,
                defects = report.defects,
                failed = report.failed,
                "Change batch processed"
            );
        }

        tracing::info!(lease = feed.lease(), "Processor stopped");
    }
}

/// Sleep for `delay`. Returns true if shutdown fired first.
async fn backoff(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
