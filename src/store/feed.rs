use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::job::Request;
use crate::store::JobStore;

/// Requests delivered together by a [`ChangeFeed`].
#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub requests: Vec<Request>,
    pub first_sequence: u64,
    pub last_sequence: u64,
    /// 1 on first delivery, incremented each time the batch is redelivered.
    pub attempt: u32,
}

impl FeedBatch {
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Lease-scoped reader over the store's request change log.
///
/// Delivery is at-least-once: the checkpoint only moves on [`ChangeFeed::ack`],
/// so an unacknowledged batch comes back on the next `next_batch` call and
/// after a restart. Consumers must tolerate seeing a request more than once,
/// including requests that are already completed.
pub struct ChangeFeed {
    store: Arc<dyn JobStore>,
    lease: String,
    batch_size: usize,
    partition: Option<(u64, u64)>,
    cursor: u64,
    in_flight: bool,
    attempt: u32,
    changes_rx: watch::Receiver<u64>,
}

impl ChangeFeed {
    /// Resume the feed for `lease` from its saved checkpoint.
    ///
    /// The checkpoint is written back straight away so the store knows about
    /// the lease before its first ack and keeps the changes it has yet to see.
    pub async fn open(store: Arc<dyn JobStore>, lease: &str, batch_size: usize) -> Result<Self> {
        let cursor = store.load_checkpoint(lease).await?;
        store.save_checkpoint(lease, cursor).await?;
        let changes_rx = store.subscribe_changes();
        tracing::info!(
            lease,
            checkpoint = cursor,
            latest = store.latest_sequence(),
            "Change feed opened"
        );
        Ok(Self {
            store,
            lease: lease.to_string(),
            batch_size: batch_size.max(1),
            partition: None,
            cursor,
            in_flight: false,
            attempt: 0,
            changes_rx,
        })
    }

    /// Only deliver requests whose id hashes to `index` out of `count`.
    /// Each partition needs its own lease name.
    pub fn with_partition(mut self, index: u64, count: u64) -> Self {
        if count > 1 {
            self.partition = Some((index % count, count));
        }
        self
    }

    pub fn lease(&self) -> &str {
        &self.lease
    }

    pub fn checkpoint(&self) -> u64 {
        self.cursor
    }

    /// Wait for the next batch past the checkpoint. Returns `None` once
    /// `shutdown` is cancelled or the store goes away.
    pub async fn next_batch(&mut self, shutdown: &CancellationToken) -> Result<Option<FeedBatch>> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }

            // Mark the current notification as seen before reading so a
            // write racing with the read still wakes the wait below.
            self.changes_rx.mark_unchanged();
            let changes = self.store.read_changes(self.cursor, self.batch_size).await?;

            if let (Some(first), Some(last)) = (changes.first(), changes.last()) {
                let first_sequence = first.sequence;
                let last_sequence = last.sequence;
                let requests = self.select(changes.into_iter().map(|c| c.request));

                if requests.is_empty() {
                    // Nothing for this partition; move past it.
                    self.store.save_checkpoint(&self.lease, last_sequence).await?;
                    self.cursor = last_sequence;
                    continue;
                }

                self.attempt = if self.in_flight { self.attempt.saturating_add(1) } else { 1 };
                self.in_flight = true;
                return Ok(Some(FeedBatch {
                    requests,
                    first_sequence,
                    last_sequence,
                    attempt: self.attempt,
                }));
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(None),
                changed = self.changes_rx.changed() => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Record the batch as processed. Later batches start after it.
    pub async fn ack(&mut self, batch: &FeedBatch) -> Result<()> {
        self.store
            .save_checkpoint(&self.lease, batch.last_sequence)
            .await?;
        self.cursor = self.cursor.max(batch.last_sequence);
        self.in_flight = false;
        self.attempt = 0;
        Ok(())
    }

    /// Keep the latest version of each request, in order of first appearance,
    /// restricted to this feed's partition.
    fn select(&self, requests: impl Iterator<Item = Request>) -> Vec<Request> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut selected: Vec<Request> = Vec::new();
        for request in requests {
            if !self.owns(&request.id) {
                continue;
            }
            match positions.get(&request.id) {
                Some(&idx) => selected[idx] = request,
                None => {
                    positions.insert(request.id.clone(), selected.len());
                    selected.push(request);
                }
            }
        }
        selected
    }

    fn owns(&self, id: &str) -> bool {
        match self.partition {
            Some((index, count)) => partition_key(id) % count == index,
            None => true,
        }
    }
}

/// FNV-1a over the id bytes; stable across processes.
fn partition_key(id: &str) -> u64 {
    id.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}
