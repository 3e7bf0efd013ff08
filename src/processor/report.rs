use crate::error::KnightError;

/// What happened to one delivered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Result written and request moved to `Completed`
    Completed { moves: usize },
    /// Request was already completed; nothing written
    AlreadyCompleted,
    /// Non-retryable defect; request left as-is for inspection
    Defect(KnightError),
    /// Retryable failure; the batch should be redelivered
    Failed(KnightError),
}

impl Outcome {
    /// Sort an error into a retryable failure or a defect.
    pub fn from_error(err: KnightError) -> Self {
        if err.is_retryable() {
            Outcome::Failed(err)
        } else {
            Outcome::Defect(err)
        }
    }
}

/// Per-batch tally of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub skipped: usize,
    pub defects: usize,
    pub failed: usize,
    /// Failures caused by the store being unavailable; a subset of `failed`.
    pub unavailable: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Completed { .. } => self.completed += 1,
            Outcome::AlreadyCompleted => self.skipped += 1,
            Outcome::Defect(_) => self.defects += 1,
            Outcome::Failed(err) => {
                self.failed += 1;
                if err.is_storage_outage() {
                    self.unavailable += 1;
                }
            }
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.defects + self.failed
    }

    /// True when any item failed in a way redelivery could fix.
    pub fn should_retry(&self) -> bool {
        self.failed > 0
    }

    /// True when some failure came from a store outage. Such a batch is
    /// redelivered for as long as the outage lasts.
    pub fn hit_outage(&self) -> bool {
        self.unavailable > 0
    }
}
