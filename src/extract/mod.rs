//! Field extraction
//!
//! This module turns a fetched page into a map of field values:
//! - `SelectorRegistry`: the configured field -> rule mapping
//! - `ExtractionRule`: text, attribute, number and presence rules
//! - `extract`: applies the registry to one page

mod extractor;
mod registry;
mod rule;

pub use extractor::extract;
pub use registry::{FieldRule, SelectorRegistry};
pub use rule::{parse_number, CompiledSelector, ExtractionRule};

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Marker written in place of a field that could not be extracted
pub const ABSENT_MARKER: &str = "NA";

/// Errors raised while extracting from a page
///
/// These are per-item and retryable; the scheduler never lets them escape.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Page {url} is unreadable: {reason}")]
    PageUnreadable { url: String, reason: String },
}

/// A fetched page, as handed to the extractor
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL the content came from
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value, if the server sent one
    pub content_type: Option<String>,

    /// Page body
    pub body: String,
}

impl Page {
    /// A successful HTML page
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
        }
    }
}

/// Value of one extracted field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Present(String),
    Absent,
}

impl FieldValue {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Present(value) => Some(value),
            Self::Absent => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or(ABSENT_MARKER))
    }
}

/// Extracted values keyed by field name
pub type Fields = BTreeMap<String, FieldValue>;
