pub mod request;
pub mod result;

pub use request::{Request, RequestStatus};
pub use result::PathResult;
