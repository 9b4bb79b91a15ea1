//! Checkpoint storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::state::Checkpoint;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
///
/// Every one of these is fatal for a run: without a durable checkpoint the
/// crawl can no longer guarantee a consistent resume point.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to read checkpoint {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Checkpoint {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Trait for checkpoint backend implementations
///
/// `save` must be atomic: after it returns, any later `load` (from this or
/// another process) sees exactly the saved snapshot, even if the process dies
/// right after.
pub trait CheckpointStore {
    /// Loads the last saved checkpoint
    ///
    /// Indices found `InProgress` are reset to `Pending`, since they belong
    /// to an attempt that never finished. A store with nothing saved yet
    /// returns an empty checkpoint.
    fn load(&mut self) -> CheckpointResult<Checkpoint>;

    /// Durably replaces the saved checkpoint
    fn save(&mut self, checkpoint: &Checkpoint) -> CheckpointResult<()>;

    /// Removes the saved checkpoint so the next run starts from scratch
    fn clear(&mut self) -> CheckpointResult<()>;

    /// Human-readable location of the checkpoint, for log and error messages
    fn location(&self) -> String;
}
