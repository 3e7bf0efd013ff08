use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::Position;
use crate::error::{KnightError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Completed,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A path request as persisted in the job store.
///
/// Coordinates are kept in their text form, the same way the store holds
/// them. They are validated once on submission and re-parsed by the
/// processor, which treats a parse failure as a defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub start_position: String,
    pub end_position: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    pub fn new(start: Position, end: Position) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            start_position: start.to_string(),
            end_position: end.to_string(),
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RequestStatus::Completed
    }

    /// Re-parse the stored coordinates.
    pub fn positions(&self) -> Result<(Position, Position)> {
        let parse = |raw: &str| {
            Position::parse(raw).map_err(|_| KnightError::ProcessingDefect {
                request_id: self.id.clone(),
                reason: format!("stored coordinate {raw:?} is not a board position"),
            })
        };
        Ok((parse(&self.start_position)?, parse(&self.end_position)?))
    }

    /// Move `Pending` to `Completed`. Returns false, leaving the request
    /// untouched, when it is already completed.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = RequestStatus::Completed;
        self.updated_at = now;
        true
    }
}
