/// Item state definitions for tracking crawl progress
///
/// This module defines all possible states a source index can be in during a run.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of one source index
///
/// Transitions are monotonic except `Failed -> Pending` (retry) and
/// `InProgress -> Pending` (an attempt interrupted by a crash or a stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ItemState {
    // ===== Active States =====
    /// Waiting to be fetched (or refetched)
    Pending,

    /// Currently being fetched and extracted
    InProgress,

    /// Last attempt failed; awaiting the retry boundary
    Failed {
        /// Attempts made so far, including the failed one
        attempts: u32,
    },

    // ===== Terminal States =====
    /// Record extracted, validated and handed to the output
    Done,

    /// Retries exhausted (or restart disabled); never attempted again
    Skipped,
}

impl ItemState {
    /// Returns true if no further processing will happen for this index
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Returns true if the transition `self -> next` is allowed
    pub fn can_transition_to(&self, next: ItemState) -> bool {
        use ItemState::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Done)
                | (InProgress, Failed { .. })
                | (InProgress, Pending)
                | (Failed { .. }, Pending)
                | (Failed { .. }, Skipped)
        )
    }

    /// Short lowercase label, as shown in summaries and logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Failed { .. } => "failed",
            Self::Done => "done",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { attempts } => write!(f, "failed({})", attempts),
            other => write!(f, "{}", other.label()),
        }
    }
}
