//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `ItemState`: the state of one source index (pending, in progress, done, failed, skipped)
//! - `Checkpoint`: the per-index state map plus attempt counters and the output offset
//! - `InputFingerprint`: path and content hash of the source list a checkpoint belongs to

mod checkpoint;
mod item_state;

// Re-export main types
pub use checkpoint::{Checkpoint, InputFingerprint, StateCounts};
pub use item_state::ItemState;
