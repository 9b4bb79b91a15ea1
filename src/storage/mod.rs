//! Storage module for persisting crawl progress
//!
//! This module handles durable state for the crawler, including:
//! - The checkpoint store trait and its JSON file implementation
//! - Atomic replace-on-write for checkpoint and output files
//! - The run lock that keeps two runs off the same checkpoint

mod atomic;
mod json;
mod lock;
mod traits;

pub use atomic::write_atomic;
pub use json::JsonCheckpointStore;
pub use lock::RunLock;
pub use traits::{CheckpointError, CheckpointResult, CheckpointStore};
