pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod job;
pub mod node;
pub mod processor;
pub mod service;
pub mod shutdown;
pub mod store;
