//! Atomic file replacement
//!
//! Writes go to a temporary file in the destination's directory which is then
//! renamed over the destination, so readers see either the old or the new
//! content, never a torn write.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with `contents` atomically
///
/// The temporary file is fsynced before the rename. It lives in the same
/// directory as `path` because a rename across filesystems is not atomic.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
