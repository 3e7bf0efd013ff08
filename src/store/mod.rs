//! Job storage contract and the change feed built on it.
//!
//! The store holds two collections keyed by request id:
//! - **Requests**: submitted jobs and their lifecycle status
//! - **Results**: at most one computed path per request
//!
//! Every write to the request collection appends a [`Change`] with a
//! monotonically increasing sequence number. [`ChangeFeed`] reads those
//! changes under a named lease and checkpoints its progress in the store,
//! which gives at-least-once delivery across restarts.

pub mod feed;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;
use crate::job::{PathResult, Request};

pub use feed::{ChangeFeed, FeedBatch};
pub use memory::MemoryJobStore;

/// One entry of the request change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub sequence: u64,
    pub request: Request,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new request. Fails with `Conflict` if the id is taken.
    async fn create_request(&self, request: Request) -> Result<String>;

    async fn get_request(&self, id: &str) -> Result<Option<Request>>;

    /// Overwrite an existing request. Must refuse a status regression, and
    /// must leave an already completed request untouched (no write, no
    /// change entry) when handed another completed copy.
    async fn replace_request(&self, request: Request) -> Result<()>;

    /// Create or overwrite the result for `result.request_id`.
    async fn upsert_result(&self, result: PathResult) -> Result<()>;

    /// `Ok(None)` while the request is pending or when the id is unknown.
    async fn get_result_by_request_id(&self, id: &str) -> Result<Option<PathResult>>;

    /// Changes with a sequence strictly greater than `after`, oldest first.
    async fn read_changes(&self, after: u64, max: usize) -> Result<Vec<Change>>;

    /// Sequence of the most recent change, 0 before the first write.
    fn latest_sequence(&self) -> u64;

    /// Notifies with the latest change sequence whenever a request is written.
    fn subscribe_changes(&self) -> watch::Receiver<u64>;

    /// Last acknowledged sequence for a lease, 0 if it never checkpointed.
    async fn load_checkpoint(&self, lease: &str) -> Result<u64>;

    /// Move the lease's checkpoint forward. Saving registers the lease, and
    /// changes are only trimmed once every registered lease is past them.
    async fn save_checkpoint(&self, lease: &str, sequence: u64) -> Result<()>;
}
