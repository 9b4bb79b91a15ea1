//! Result sink traits and error types
//!
//! This module defines the trait interface for record sinks and
//! associated error types.

use crate::record::CrawlRecord;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during output operations
///
/// All of these are fatal for a run.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to read existing output {path}: {source}")]
    Read { path: PathBuf, source: csv::Error },

    #[error("Failed to write output {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Existing output {path} has no 'index' column")]
    MissingIndexColumn { path: PathBuf },

    #[error("Existing output {path} has a bad index '{value}' on row {row}")]
    BadIndex {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for record sinks
///
/// A sink is the only writer of output records. Appends are buffered until
/// `flush`; after `flush` returns every appended record is visible in the
/// durable output. Appending the same index twice, in this run or across runs,
/// leaves one row for it (the last appended).
pub trait ResultSink {
    /// Buffers a record for the next flush
    fn append(&mut self, record: CrawlRecord) -> OutputResult<()>;

    /// Makes all buffered records durable
    ///
    /// # Returns
    ///
    /// The number of rows in the output after the flush
    fn flush(&mut self) -> OutputResult<usize>;

    /// Number of records appended since the last flush
    fn buffered(&self) -> usize;

    /// Human-readable location of the output
    fn location(&self) -> String;
}
