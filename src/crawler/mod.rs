//! Crawler module for fetching pages and driving a run
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and block detection
//! - Batch scheduling, retries and checkpointing
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{load_summary, RunController, RunOptions, RunOutcome, RunStatus};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use scheduler::{resolve_range, BatchScheduler, Pacing, SchedulerOutcome};
