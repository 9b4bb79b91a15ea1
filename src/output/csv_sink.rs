//! CSV result sink
//!
//! Records are buffered by index and merged into the existing output file on
//! every flush. The merged file is rewritten atomically, sorted by index.

use crate::extract::ABSENT_MARKER;
use crate::output::traits::{OutputError, OutputResult, ResultSink};
use crate::record::CrawlRecord;
use crate::storage::write_atomic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const INDEX_COLUMN: &str = "index";

/// Result sink writing a CSV spreadsheet
pub struct CsvSink {
    path: PathBuf,
    carry_columns: Vec<String>,
    field_names: Vec<String>,
    buffered: BTreeMap<usize, CrawlRecord>,
}

impl CsvSink {
    /// Creates a sink for `path`
    ///
    /// # Arguments
    ///
    /// * `path` - The output CSV file; created on first flush
    /// * `carry_columns` - Input columns copied through, in output order
    /// * `field_names` - Extracted fields, in output order
    pub fn new(path: impl Into<PathBuf>, carry_columns: Vec<String>, field_names: Vec<String>) -> Self {
        Self {
            path: path.into(),
            carry_columns,
            field_names,
            buffered: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column headers in output order
    pub fn header(&self) -> Vec<String> {
        let mut header = vec![INDEX_COLUMN.to_string(), "url".to_string()];
        header.extend(self.carry_columns.iter().cloned());
        header.extend(self.field_names.iter().cloned());
        header.push("status".to_string());
        header.push("extracted_at".to_string());
        header
    }

    /// Deletes the output file, if any, and drops buffered records
    pub fn clear(&mut self) -> OutputResult<()> {
        self.buffered.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OutputError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn to_row(&self, record: &CrawlRecord) -> Vec<String> {
        let mut row = Vec::with_capacity(self.carry_columns.len() + self.field_names.len() + 4);
        row.push(record.index.to_string());
        row.push(record.url.clone());
        for column in &self.carry_columns {
            row.push(record.carried.get(column).cloned().unwrap_or_default());
        }
        for name in &self.field_names {
            let value = record
                .fields
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or(ABSENT_MARKER);
            row.push(value.to_string());
        }
        row.push(record.status.to_string());
        row.push(record.extracted_at.to_rfc3339());
        row
    }

    /// Reads the existing output, re-shaped to the current header
    ///
    /// Columns the old file lacks are filled with the absent marker, so a
    /// field added between runs does not invalidate earlier rows.
    fn read_existing(&self) -> OutputResult<BTreeMap<usize, Vec<String>>> {
        let mut rows = BTreeMap::new();
        if !self.path.exists() {
            return Ok(rows);
        }

        let read_err = |source| OutputError::Read {
            path: self.path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(read_err)?;
        let existing: Vec<String> = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let index_pos = existing
            .iter()
            .position(|h| h == INDEX_COLUMN)
            .ok_or_else(|| OutputError::MissingIndexColumn {
                path: self.path.clone(),
            })?;
        let positions: Vec<Option<usize>> = self
            .header()
            .iter()
            .map(|column| existing.iter().position(|h| h == column))
            .collect();

        for (row_number, result) in reader.records().enumerate() {
            let record = result.map_err(read_err)?;
            let raw_index = record.get(index_pos).unwrap_or("");
            let index: usize = raw_index.trim().parse().map_err(|_| OutputError::BadIndex {
                path: self.path.clone(),
                row: row_number + 1,
                value: raw_index.to_string(),
            })?;

            let row = positions
                .iter()
                .map(|pos| {
                    pos.and_then(|p| record.get(p))
                        .unwrap_or(ABSENT_MARKER)
                        .to_string()
                })
                .collect();
            rows.insert(index, row);
        }

        Ok(rows)
    }
}

impl ResultSink for CsvSink {
    fn append(&mut self, record: CrawlRecord) -> OutputResult<()> {
        tracing::debug!("Buffered record for index {}", record.index);
        self.buffered.insert(record.index, record);
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<usize> {
        let mut rows = self.read_existing()?;
        if self.buffered.is_empty() {
            return Ok(rows.len());
        }

        for (index, record) in &self.buffered {
            rows.insert(*index, self.to_row(record));
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.header())?;
        for row in rows.values() {
            writer.write_record(row)?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;

        write_atomic(&self.path, &bytes).map_err(|source| OutputError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!(
            "Flushed {} record(s) to {} ({} rows)",
            self.buffered.len(),
            self.path.display(),
            rows.len()
        );
        self.buffered.clear();
        Ok(rows.len())
    }

    fn buffered(&self) -> usize {
        self.buffered.len()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
