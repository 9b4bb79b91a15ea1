//! JSON checkpoint storage
//!
//! This module provides a file-based implementation of the `CheckpointStore`
//! trait. The file is pretty-printed JSON so it can be inspected by hand, and
//! deleting it forces a full re-run.

use crate::state::Checkpoint;
use crate::storage::atomic::write_atomic;
use crate::storage::traits::{CheckpointError, CheckpointResult, CheckpointStore};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Checkpoint stored as a JSON file
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    /// Creates a store backed by the file at `path`
    ///
    /// Nothing is read or written until `load` or `save` is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the checkpoint without crash recovery, for inspection
    pub fn peek(&self) -> CheckpointResult<Option<Checkpoint>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&mut self) -> CheckpointResult<Checkpoint> {
        let Some(mut checkpoint) = self.peek()? else {
            tracing::info!(
                "No checkpoint at {}, starting from scratch",
                self.path.display()
            );
            return Ok(Checkpoint::new());
        };

        let recovered = checkpoint.recover_interrupted();
        if !recovered.is_empty() {
            tracing::warn!(
                "Reset {} interrupted item(s) to pending: {:?}",
                recovered.len(),
                recovered
            );
        }

        tracing::info!(
            "Loaded checkpoint {} (output offset {})",
            self.path.display(),
            checkpoint.output_offset
        );
        Ok(checkpoint)
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        let mut snapshot = checkpoint.clone();
        snapshot.updated_at = Some(Utc::now());

        let json = serde_json::to_vec_pretty(&snapshot)?;
        write_atomic(&self.path, &json).map_err(|source| CheckpointError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!("Checkpoint saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&mut self) -> CheckpointResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
