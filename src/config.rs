use std::net::SocketAddr;
use std::time::Duration;

/// Settings for the change-feed processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Lease name the processor checkpoints under. Workers append their index.
    pub lease: String,
    /// Maximum changes read per batch
    pub batch_size: usize,
    /// Maximum requests computed at once within a batch
    pub max_concurrency: usize,
    /// Deliveries of a failing batch before it is acknowledged anyway.
    /// Store outages do not count; those batches wait for the store.
    pub max_delivery_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            lease: "knight-path-processor".to_string(),
            batch_size: 100,
            max_concurrency: 8,
            max_delivery_attempts: 5,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 5_000,
        }
    }
}

impl ProcessorConfig {
    /// Backoff before redelivering a batch that failed on `attempt` (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.retry_base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.retry_max_delay_ms))
    }

    /// Lease name for worker `index`.
    pub fn lease_for(&self, index: usize) -> String {
        format!("{}-{}", self.lease, index)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    /// Processor workers, each owning one partition of the change feed
    pub workers: usize,
    /// Capacity of the in-memory request collection
    pub max_requests: usize,
    pub processor: ProcessorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "127.0.0.1:7071"
                .parse()
                .expect("default listen address is valid"),
            workers: 1,
            max_requests: 100_000,
            processor: ProcessorConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_processor(mut self, processor: ProcessorConfig) -> Self {
        self.processor = processor;
        self
    }
}
