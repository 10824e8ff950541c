//! CSV seed import for first runs.
//!
//! A seed file's header row names record keys; each row becomes one [`Record`]. Cells are
//! taken as plain text, so backslashes are escaped before the record reaches a decoder.
//! Columns a seed leaves out can be filled with per-kind defaults.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::codec::{Record, NULL_SENTINEL};

const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, thiserror::Error)]
pub enum SeedImportError {
    #[error("failed to open seed file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid seed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Rows read from one seed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedRows {
    pub records: Vec<Record>,
    /// Rows dropped because they could not be read or did not match the header.
    pub skipped: usize,
}

/// Turns header-keyed CSV rows into codec records.
#[derive(Debug, Clone, Default)]
pub struct CsvSeedImporter {
    defaults: Vec<(String, String)>,
    nullable: Vec<String>,
}

impl CsvSeedImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value used for `key` whenever the seed has no such column.
    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.push((key.into(), value.into()));
        self
    }

    /// Blank cells in column `key` decode as null rather than empty text.
    pub fn nullable(mut self, key: impl Into<String>) -> Self {
        self.nullable.push(key.into());
        self
    }

    pub fn from_path(&self, path: impl AsRef<Path>) -> Result<SeedRows, SeedImportError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SeedImportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.from_reader(file)
    }

    pub fn from_reader<R: Read>(&self, reader: R) -> Result<SeedRows, SeedImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| header.trim_start_matches(BYTE_ORDER_MARK).trim().to_string())
            .collect();

        let mut seed = SeedRows::default();
        for row in csv_reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(error) if error.is_io_error() => return Err(error.into()),
                Err(error) => {
                    warn!(%error, "skipping unreadable seed row");
                    seed.skipped += 1;
                    continue;
                }
            };
            if row.iter().all(str::is_empty) {
                continue;
            }
            if row.len() != headers.len() {
                warn!(
                    line = ?row.position().map(|position| position.line()),
                    expected = headers.len(),
                    found = row.len(),
                    "skipping seed row with wrong column count"
                );
                seed.skipped += 1;
                continue;
            }

            let mut record = Record::new();
            for (key, value) in headers.iter().zip(row.iter()) {
                if value.is_empty() && self.nullable.contains(key) {
                    record.insert(key.as_str(), NULL_SENTINEL);
                } else {
                    record.insert(key.as_str(), value.replace('\\', "\\\\"));
                }
            }
            for (key, value) in &self.defaults {
                if record.get(key).is_none() {
                    record.insert(key.as_str(), value.as_str());
                }
            }
            seed.records.push(record);
        }
        Ok(seed)
    }
}
