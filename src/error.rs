use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KnightError {
    #[error("Invalid board position: {0:?}")]
    InvalidPosition(String),

    #[error("No knight path from {start} to {end}")]
    PathNotFound { start: String, end: String },

    #[error("Request {request_id} cannot be processed: {reason}")]
    ProcessingDefect { request_id: String, reason: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Request not found: {0}")]
    RequestNotFound(String),

    #[error("Record already exists: {0}")]
    Conflict(String),

    #[error("Request {request_id} cannot move back to pending")]
    InvalidTransition { request_id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KnightError {
    /// Whether redelivering the triggering change may succeed.
    ///
    /// `PathNotFound` is not: the search is deterministic, so a redelivery
    /// would fail the same way.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KnightError::StorageUnavailable(_) | KnightError::Internal(_)
        )
    }

    /// Whether the error comes from the store being unreachable rather than
    /// from the request or the processor itself.
    pub fn is_storage_outage(&self) -> bool {
        matches!(self, KnightError::StorageUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, KnightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(KnightError::StorageUnavailable("down".into()).is_retryable());
        assert!(KnightError::Internal("panic".into()).is_retryable());
        assert!(!KnightError::PathNotFound {
            start: "A1".into(),
            end: "H8".into()
        }
        .is_retryable());
        assert!(KnightError::StorageUnavailable("down".into()).is_storage_outage());
        assert!(!KnightError::Internal("panic".into()).is_storage_outage());
        assert!(!KnightError::InvalidPosition("Z9".into()).is_retryable());
        assert!(!KnightError::ProcessingDefect {
            request_id: "x".into(),
            reason: "bad".into()
        }
        .is_retryable());
        assert!(!KnightError::InvalidTransition {
            request_id: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn invalid_position_message_quotes_input() {
        let err = KnightError::InvalidPosition("Z9".into());
        assert_eq!(err.to_string(), "Invalid board position: \"Z9\"");
    }
}
