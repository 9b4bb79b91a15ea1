//! Crawl records and their validation
//!
//! A `CrawlRecord` is the structured output for one source URL. It is built by
//! the batch scheduler from the extractor's fields and the validator's verdict,
//! and never changes after that.

mod validator;

pub use validator::RecordValidator;

use crate::extract::Fields;
use crate::input::CrawlTarget;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Validation verdict for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    /// Every required field is present and well formed
    Valid,

    /// Some required fields present, some absent
    Partial,

    /// No required field present, or a field failed its shape check
    Invalid,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Partial => "partial",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output for one source URL
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRecord {
    pub index: usize,
    pub url: String,
    /// Input columns carried through to the output unchanged
    pub carried: BTreeMap<String, String>,
    pub fields: Fields,
    pub status: RecordStatus,
    pub extracted_at: DateTime<Utc>,
}

impl CrawlRecord {
    /// Builds the record for a target from extracted fields and a verdict
    pub fn new(target: &CrawlTarget, fields: Fields, status: RecordStatus) -> Self {
        Self {
            index: target.index,
            url: target.url.clone(),
            carried: target.carried.clone(),
            fields,
            status,
            extracted_at: Utc::now(),
        }
    }
}
