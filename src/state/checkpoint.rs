use crate::state::ItemState;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Snapshot of crawl progress
///
/// Holds exactly one `ItemState` per source index (indices never touched are
/// implicitly `Pending`), the attempt counter per index, and how many rows the
/// output held after the last flush. This is the single source of truth for
/// resuming a run; the batch scheduler is its only writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Hash of the config file of the run that wrote this checkpoint
    #[serde(default)]
    pub config_hash: Option<String>,

    /// Source list the indices refer to
    #[serde(default)]
    pub input: Option<InputFingerprint>,

    /// When this checkpoint was last persisted
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Rows present in the output after the last flush
    #[serde(default)]
    pub output_offset: usize,

    #[serde(default)]
    items: BTreeMap<usize, ItemState>,

    #[serde(default)]
    attempts: BTreeMap<usize, u32>,
}

/// Identifies the input file a checkpoint was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFingerprint {
    pub path: String,
    pub sha256: String,
}

impl InputFingerprint {
    /// True when both fingerprints describe the same source list
    ///
    /// Content decides; a moved but unchanged file still matches.
    pub fn matches(&self, other: &InputFingerprint) -> bool {
        self.sha256 == other.sha256
    }
}

/// Count of indices per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub done: usize,
    pub skipped: usize,
}

impl StateCounts {
    /// Total number of indices counted
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.failed + self.done + self.skipped
    }

    /// True when nothing is left to do
    pub fn is_complete(&self) -> bool {
        self.pending == 0 && self.in_progress == 0 && self.failed == 0
    }
}

impl Checkpoint {
    /// Creates an empty checkpoint (every index pending)
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an index
    pub fn state(&self, index: usize) -> ItemState {
        self.items.get(&index).copied().unwrap_or(ItemState::Pending)
    }

    /// Attempts made so far for an index
    pub fn attempts(&self, index: usize) -> u32 {
        self.attempts.get(&index).copied().unwrap_or(0)
    }

    /// Returns true if the index is `Done` or `Skipped`
    pub fn is_settled(&self, index: usize) -> bool {
        self.state(index).is_terminal()
    }

    /// Moves an index to a new state
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::InvalidTransition` if the move is not one the
    /// item state machine allows. The checkpoint is left unchanged.
    pub fn mark(&mut self, index: usize, next: ItemState) -> Result<(), HarvestError> {
        let current = self.state(index);
        if !current.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                index,
                from: current,
                to: next,
            });
        }

        if let ItemState::Failed { attempts } = next {
            self.attempts.insert(index, attempts);
        }

        if next == ItemState::Pending {
            // Pending is the implicit default, keep the file small
            self.items.remove(&index);
        } else {
            self.items.insert(index, next);
        }
        Ok(())
    }

    /// Resets every `InProgress` index to `Pending`
    ///
    /// An in-progress index found at startup belongs to an attempt that never
    /// finished. Returns the recovered indices.
    pub fn recover_interrupted(&mut self) -> Vec<usize> {
        let interrupted: Vec<usize> = self
            .items
            .iter()
            .filter(|(_, state)| **state == ItemState::InProgress)
            .map(|(index, _)| *index)
            .collect();

        for index in &interrupted {
            self.items.remove(index);
        }
        interrupted
    }

    /// Indices in `Failed` state within a range, ascending
    pub fn failed_in(&self, range: &RangeInclusive<usize>) -> Vec<(usize, u32)> {
        self.items
            .range(range.clone())
            .filter_map(|(index, state)| match state {
                ItemState::Failed { attempts } => Some((*index, *attempts)),
                _ => None,
            })
            .collect()
    }

    /// Counts states over a range of indices
    pub fn counts(&self, range: &RangeInclusive<usize>) -> StateCounts {
        let mut counts = StateCounts::default();
        if range.is_empty() {
            return counts;
        }

        let total = range.end() - range.start() + 1;
        let mut recorded = 0;
        for state in self.items.range(range.clone()).map(|(_, s)| s) {
            recorded += 1;
            counts.add(state);
        }
        counts.pending += total - recorded;
        counts
    }

    /// Lowest and highest recorded index, if any index was ever recorded
    pub fn recorded_range(&self) -> Option<RangeInclusive<usize>> {
        let first = *self.items.keys().next()?;
        let last = *self.items.keys().next_back()?;
        Some(first..=last)
    }
}

impl StateCounts {
    fn add(&mut self, state: &ItemState) {
        match state {
            ItemState::Pending => self.pending += 1,
            ItemState::InProgress => self.in_progress += 1,
            ItemState::Failed { .. } => self.failed += 1,
            ItemState::Done => self.done += 1,
            ItemState::Skipped => self.skipped += 1,
        }
    }
}
