//! Run summary generation
//!
//! This module builds and displays the end-of-run summary from a checkpoint.

use crate::state::{Checkpoint, StateCounts};
use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;

/// Summary of a run over a resolved index range
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// First index of the resolved range
    pub start: usize,

    /// Last index of the resolved range (inclusive)
    pub end: usize,

    /// Item states over the range
    pub counts: StateCounts,

    /// Rows in the output after the last flush
    pub output_rows: usize,

    /// When the checkpoint was last persisted
    pub checkpoint_saved_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Summarizes a checkpoint over `range`
    pub fn from_checkpoint(checkpoint: &Checkpoint, range: &RangeInclusive<usize>) -> Self {
        Self {
            start: *range.start(),
            end: *range.end(),
            counts: checkpoint.counts(range),
            output_rows: checkpoint.output_offset,
            checkpoint_saved_at: checkpoint.updated_at,
        }
    }

    /// Summarizes every index the checkpoint has recorded
    ///
    /// Returns `None` for a checkpoint that has never recorded an item.
    pub fn from_recorded(checkpoint: &Checkpoint) -> Option<Self> {
        let range = checkpoint.recorded_range()?;
        Some(Self::from_checkpoint(checkpoint, &range))
    }

    /// True when every index is done or skipped
    pub fn is_complete(&self) -> bool {
        self.counts.is_complete()
    }

    pub fn has_skipped(&self) -> bool {
        self.counts.skipped > 0
    }

    /// Percentage of indices that ended done
    pub fn success_rate(&self) -> f64 {
        let total = self.counts.total();
        if total == 0 {
            return 0.0;
        }
        (self.counts.done as f64 / total as f64) * 100.0
    }
}

/// Prints a run summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Range: {}..={}", summary.start, summary.end);
    println!("  Total items: {}", summary.counts.total());
    println!("  Output rows: {}", summary.output_rows);
    if let Some(saved_at) = summary.checkpoint_saved_at {
        println!("  Checkpoint saved: {}", saved_at.to_rfc3339());
    }
    println!();

    let total = summary.counts.total();
    let percent = |count: usize| {
        if total > 0 {
            (count as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    };

    println!("Items by State:");
    for (label, count) in [
        ("done", summary.counts.done),
        ("skipped", summary.counts.skipped),
        ("failed", summary.counts.failed),
        ("pending", summary.counts.pending + summary.counts.in_progress),
    ] {
        println!("  {}: {} ({:.1}%)", label, count, percent(count));
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} items done)",
        summary.success_rate(),
        summary.counts.done,
        total
    );
}
