use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::run_api;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::processor::Processor;
use crate::service::JobService;
use crate::store::{ChangeFeed, JobStore, MemoryJobStore};

/// Wires the store, the processor workers and the HTTP API together.
pub struct Node {
    pub config: ServiceConfig,
    pub store: Arc<dyn JobStore>,
    pub service: JobService,
}

impl Node {
    /// Node backed by a fresh in-memory store.
    pub fn new(config: ServiceConfig) -> Self {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::with_capacity(config.max_requests));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ServiceConfig, store: Arc<dyn JobStore>) -> Self {
        let service = JobService::new(store.clone());
        Self {
            config,
            store,
            service,
        }
    }

    /// Start one processor per configured worker. Worker `i` owns partition
    /// `i` of the change feed under its own lease.
    pub async fn spawn_processors(&self, shutdown: &CancellationToken) -> Result<Vec<JoinHandle<()>>> {
        let workers = self.config.workers.max(1);
        let processor = Arc::new(Processor::new(
            self.store.clone(),
            self.config.processor.clone(),
        ));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let lease = self.config.processor.lease_for(index);
            let feed = ChangeFeed::open(
                self.store.clone(),
                &lease,
                self.config.processor.batch_size,
            )
            .await?
            .with_partition(index as u64, workers as u64);

            let processor = processor.clone();
            let token = shutdown.clone();
            handles.push(tokio::spawn(async move {
                processor.run(feed, token).await;
            }));
        }
        Ok(handles)
    }

    /// Run the processors and the HTTP API until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if a change feed cannot be opened or the HTTP server
    /// fails. The processors are stopped in both cases.
    pub async fn run(self, shutdown: CancellationToken) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let handles = self.spawn_processors(&shutdown).await?;

        let served = run_api(self.config.listen_addr, self.service.clone(), shutdown.clone()).await;
        if let Err(e) = &served {
            tracing::error!(error = %e, "HTTP API failed");
        }

        shutdown.cancel();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Processor task ended abnormally");
            }
        }

        served?;
        Ok(())
    }
}
