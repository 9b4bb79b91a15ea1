//! Source spreadsheet reading
//!
//! Loads the ordered list of crawl targets from a CSV file. Row order defines
//! the index of each target, counting data rows from zero.

use crate::InputError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// One URL to crawl, identified by its position in the source list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    /// 0-based position in the source list
    pub index: usize,

    pub url: String,

    /// Extra input columns copied into the output row
    pub carried: BTreeMap<String, String>,
}

impl CrawlTarget {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            carried: BTreeMap::new(),
        }
    }
}

/// Loads crawl targets from a CSV file with a header row
///
/// # Arguments
///
/// * `path` - The CSV file
/// * `url_column` - Header of the URL column
/// * `carry_columns` - Headers of columns to copy into the output; a missing
///   carry column is an error, an empty cell is carried as an empty string
///
/// Rows with an empty URL keep their index (so indices stay aligned with the
/// sheet); they fail at fetch time and end up skipped.
pub fn load_targets(
    path: &Path,
    url_column: &str,
    carry_columns: &[String],
) -> Result<Vec<CrawlTarget>, InputError> {
    let read_err = |source| InputError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;

    let headers = reader.headers().map_err(read_err)?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| InputError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };

    let url_pos = column(url_column)?;
    let carry_pos = carry_columns
        .iter()
        .map(|name| column(name).map(|pos| (name.clone(), pos)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut targets = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(read_err)?;
        let url = row.get(url_pos).unwrap_or_default().to_string();
        let carried = carry_pos
            .iter()
            .map(|(name, pos)| (name.clone(), row.get(*pos).unwrap_or_default().to_string()))
            .collect();

        targets.push(CrawlTarget {
            index,
            url,
            carried,
        });
    }

    tracing::info!("Loaded {} targets from {}", targets.len(), path.display());
    Ok(targets)
}

/// Computes a SHA-256 hash of the input file content
///
/// Stored in the checkpoint so a resume against a different source list is
/// caught instead of treating its indices as already crawled.
pub fn hash_input(path: &Path) -> Result<String, InputError> {
    let content = std::fs::read(path).map_err(|source| InputError::Hash {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}
