//! Run lock
//!
//! A marker file next to the checkpoint that rejects a second run against the
//! same checkpoint while the first is active.

use crate::HarvestError;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Held for the duration of a run; removes its marker file on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Path of the lock marker belonging to a checkpoint file
    pub fn lock_path(checkpoint_path: &Path) -> PathBuf {
        let mut name = checkpoint_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        checkpoint_path.with_file_name(name)
    }

    /// Creates the lock marker for a checkpoint
    ///
    /// # Errors
    ///
    /// * `HarvestError::RunLocked` - the marker already exists
    /// * `HarvestError::Io` - the marker could not be created
    pub fn acquire(checkpoint_path: &Path) -> Result<Self, HarvestError> {
        Self::acquire_with(checkpoint_path, write_owner)
    }

    fn acquire_with(
        checkpoint_path: &Path,
        write: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<Self, HarvestError> {
        let path = Self::lock_path(checkpoint_path);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(HarvestError::RunLocked { path });
            }
            Err(e) => return Err(e.into()),
        };

        // The marker exists from here on; dropping the lock removes it
        let lock = Self { path };
        write(&mut file)?;

        tracing::debug!("Acquired run lock {}", lock.path.display());
        Ok(lock)
    }

    /// Removes a leftover marker from a run that died without cleaning up
    pub fn break_stale(checkpoint_path: &Path) -> io::Result<bool> {
        let path = Self::lock_path(checkpoint_path);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::warn!("Removed stale run lock {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove run lock {}: {}", self.path.display(), e);
        }
    }
}

/// Records who holds the lock, for an operator inspecting a leftover marker
fn write_owner(file: &mut File) -> io::Result<()> {
    writeln!(file, "pid={}", std::process::id())?;
    writeln!(file, "started_at={}", Utc::now().to_rfc3339())
}
