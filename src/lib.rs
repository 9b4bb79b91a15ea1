//! Harvest: a resumable product-page crawler
//!
//! This crate walks a spreadsheet of product URLs in bounded batches, extracts
//! configured fields from every page, validates the resulting records and writes
//! them to an output spreadsheet. Progress is checkpointed after every batch so an
//! interrupted or failed run picks up where it stopped.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod input;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Harvest operations
///
/// Only fatal conditions end up here. Per-item failures (fetch errors,
/// unreadable pages, invalid records) are absorbed by the batch scheduler and
/// turned into item state transitions.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Selector registry error: {0}")]
    UnknownField(#[from] UnknownFieldError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] storage::CheckpointError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Another run holds the checkpoint lock {path} (use --break-lock if it is stale)")]
    RunLocked { path: PathBuf },

    #[error("Invalid state transition for index {index}: {from} -> {to}")]
    InvalidTransition {
        index: usize,
        from: state::ItemState,
        to: state::ItemState,
    },

    #[error(
        "Checkpoint {checkpoint} was written for input {recorded}, not {current} \
         (use --fresh to start over)"
    )]
    InputMismatch {
        checkpoint: String,
        recorded: String,
        current: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run aborted: {source}. Last persisted checkpoint: {last_checkpoint}")]
    Aborted {
        source: Box<HarvestError>,
        last_checkpoint: String,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid selector '{selector}' for field '{field}'")]
    InvalidSelector { field: String, selector: String },
}

/// A field name was referenced that has no extraction rule
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown field '{0}': no extraction rule is configured for it")]
pub struct UnknownFieldError(pub String);

/// Errors reading the source spreadsheet
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read input {path}: {source}")]
    Read { path: PathBuf, source: csv::Error },

    #[error("Input {path} has no column named '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Failed to hash input {path}: {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, RunConfig};
pub use crawler::{BatchScheduler, Fetcher, HttpFetcher, RunController, RunOutcome};
pub use extract::{ExtractionRule, SelectorRegistry};
pub use input::CrawlTarget;
pub use record::{CrawlRecord, RecordStatus};
pub use state::{Checkpoint, ItemState};
