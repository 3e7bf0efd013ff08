//! Change-driven processing of path requests.
//!
//! # Flow
//!
//! 1. [`ChangeFeed`](crate::store::ChangeFeed) delivers a batch of changed requests
//! 2. [`Processor::process_batch`] handles each request independently:
//!    skip if completed, search, upsert the result, mark the request completed
//! 3. [`Processor::run`] acknowledges the batch, or leaves it for redelivery
//!    when a retryable failure occurred
//!
//! Delivery is at-least-once and may be concurrent, so every step is
//! idempotent per request.

pub mod pipeline;
pub mod report;

pub use pipeline::Processor;
pub use report::{BatchReport, Outcome};
