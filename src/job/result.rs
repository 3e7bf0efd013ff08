use serde::{Deserialize, Serialize};

use crate::board::Position;
use crate::job::request::Request;

/// Computed path for a request. `id` and `request_id` both equal the
/// request's id, so there is at most one result per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResult {
    pub id: String,
    pub request_id: String,
    pub start_position: String,
    pub end_position: String,
    pub shortest_path: Vec<Position>,
    pub number_of_moves: usize,
}

impl PathResult {
    pub fn from_request(request: &Request, shortest_path: Vec<Position>) -> Self {
        Self {
            id: request.id.clone(),
            request_id: request.id.clone(),
            start_position: request.start_position.clone(),
            end_position: request.end_position.clone(),
            number_of_moves: shortest_path.len().saturating_sub(1),
            shortest_path,
        }
    }
}
