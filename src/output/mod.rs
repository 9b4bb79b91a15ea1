//! Output module for crawl records and run summaries
//!
//! This module handles:
//! - Buffering validated records and flushing them to the output spreadsheet
//! - Summarizing item states at the end of a run

mod csv_sink;
pub mod stats;
mod traits;

pub use csv_sink::CsvSink;
pub use stats::{print_summary, RunSummary};
pub use traits::{OutputError, OutputResult, ResultSink};
