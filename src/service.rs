use std::sync::Arc;

use crate::board::Position;
use crate::error::Result;
use crate::job::{PathResult, Request};
use crate::store::JobStore;

/// Submission and retrieval over a job store.
///
/// `submit` returns a tracking id straight away; the result shows up in
/// `get_result` once the processor has handled the request.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Validate both coordinates and store a pending request.
    ///
    /// Invalid input fails with `InvalidPosition` before anything is written.
    pub async fn submit(&self, start: &str, end: &str) -> Result<String> {
        let start = Position::parse(start)?;
        let end = Position::parse(end)?;
        let request = Request::new(start, end);
        let id = self.store.create_request(request).await?;
        tracing::info!(request_id = %id, start = %start, end = %end, "Request submitted");
        Ok(id)
    }

    /// `Ok(None)` for unknown ids and for requests still pending.
    pub async fn get_result(&self, request_id: &str) -> Result<Option<PathResult>> {
        self.store.get_result_by_request_id(request_id).await
    }
}
