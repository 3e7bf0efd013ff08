use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use crate::error::{KnightError, Result};
use crate::job::{PathResult, Request};
use crate::store::{Change, JobStore};

const DEFAULT_MAX_REQUESTS: usize = 100_000;

#[derive(Debug, Default)]
struct Collections {
    requests: HashMap<String, Request>,
    results: HashMap<String, PathResult>,
    changes: Vec<Change>,
    checkpoints: HashMap<String, u64>,
    last_sequence: u64,
}

impl Collections {
    fn append_change(&mut self, request: Request) -> u64 {
        self.last_sequence += 1;
        self.changes.push(Change {
            sequence: self.last_sequence,
            request,
        });
        self.last_sequence
    }

    /// Drop changes every registered lease has already acknowledged.
    fn trim_changes(&mut self) -> usize {
        let Some(floor) = self.checkpoints.values().copied().min() else {
            return 0;
        };
        let cut = self.changes.partition_point(|c| c.sequence <= floor);
        self.changes.drain(..cut);
        cut
    }
}

/// In-process job store.
///
/// All collections sit behind one lock so a request write and its change
/// entry are atomic. Change notification goes through a `watch` channel
/// carrying the latest sequence number.
#[derive(Debug)]
pub struct MemoryJobStore {
    inner: RwLock<Collections>,
    changes_tx: watch::Sender<u64>,
    max_requests: usize,
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_REQUESTS)
    }

    pub fn with_capacity(max_requests: usize) -> Self {
        let (changes_tx, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Collections::default()),
            changes_tx,
            max_requests,
        }
    }

    pub async fn request_count(&self) -> usize {
        self.inner.read().await.requests.len()
    }

    pub async fn result_count(&self) -> usize {
        self.inner.read().await.results.len()
    }

    /// Changes still retained in the log.
    pub async fn retained_changes(&self) -> usize {
        self.inner.read().await.changes.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_request(&self, request: Request) -> Result<String> {
        let mut inner = self.inner.write().await;
        if inner.requests.contains_key(&request.id) {
            return Err(KnightError::Conflict(request.id));
        }
        if inner.requests.len() >= self.max_requests {
            return Err(KnightError::StorageUnavailable(
                "request collection is at capacity".to_string(),
            ));
        }
        let id = request.id.clone();
        inner.requests.insert(id.clone(), request.clone());
        let sequence = inner.append_change(request);
        self.changes_tx.send_replace(sequence);
        Ok(id)
    }

    async fn get_request(&self, id: &str) -> Result<Option<Request>> {
        Ok(self.inner.read().await.requests.get(id).cloned())
    }

    async fn replace_request(&self, request: Request) -> Result<()> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .requests
            .get(&request.id)
            .ok_or_else(|| KnightError::RequestNotFound(request.id.clone()))?;
        if existing.is_completed() {
            if !request.is_completed() {
                return Err(KnightError::InvalidTransition {
                    request_id: request.id,
                });
            }
            // Completed is terminal: a second completion leaves the stored
            // document and the change log untouched.
            tracing::debug!(request_id = %request.id, "Request already completed, replace ignored");
            return Ok(());
        }
        inner.requests.insert(request.id.clone(), request.clone());
        let sequence = inner.append_change(request);
        self.changes_tx.send_replace(sequence);
        Ok(())
    }

    async fn upsert_result(&self, result: PathResult) -> Result<()> {
        self.inner
            .write()
            .await
            .results
            .insert(result.request_id.clone(), result);
        Ok(())
    }

    async fn get_result_by_request_id(&self, id: &str) -> Result<Option<PathResult>> {
        Ok(self.inner.read().await.results.get(id).cloned())
    }

    async fn read_changes(&self, after: u64, max: usize) -> Result<Vec<Change>> {
        let inner = self.inner.read().await;
        let start = inner.changes.partition_point(|c| c.sequence <= after);
        Ok(inner.changes[start..].iter().take(max).cloned().collect())
    }

    fn latest_sequence(&self) -> u64 {
        *self.changes_tx.borrow()
    }

    fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changes_tx.subscribe()
    }

    async fn load_checkpoint(&self, lease: &str) -> Result<u64> {
        Ok(self
            .inner
            .read()
            .await
            .checkpoints
            .get(lease)
            .copied()
            .unwrap_or(0))
    }

    async fn save_checkpoint(&self, lease: &str, sequence: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = inner.checkpoints.entry(lease.to_string()).or_insert(0);
        if sequence > *entry {
            *entry = sequence;
        }
        let trimmed = inner.trim_changes();
        if trimmed > 0 {
            tracing::debug!(lease, trimmed, "Trimmed acknowledged changes");
        }
        Ok(())
    }
}
