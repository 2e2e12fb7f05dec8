//! Offline catalog backed by a JSON Lines snapshot.
//!
//! Each line of a snapshot file is one serialized [`CatalogRow`]. Snapshots
//! let the engine run without a live warehouse: capture once, analyze many
//! times, or check a fixture into a repository.
//!
//! Loading is resilient. A malformed line is skipped and reported as a
//! [`SnapshotWarning`]; only I/O failures are errors.

use super::{CatalogConnection, CatalogRow, SourceError};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Non-fatal problem found while loading a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotWarning {
    /// A line contained malformed JSON or did not describe a catalog row.
    ///
    /// **Effect**: the line is skipped; other rows still load.
    MalformedLine {
        /// The 1-based line number
        line_number: usize,
        /// Parser error description
        error: String,
    },
}

impl std::fmt::Display for SnapshotWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedLine { line_number, error } => {
                write!(f, "line {line_number}: {error}")
            }
        }
    }
}

/// A [`CatalogConnection`] serving rows from a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCatalog {
    by_database: BTreeMap<String, Vec<CatalogRow>>,
}

impl SnapshotCatalog {
    /// Build a catalog from rows already in memory.
    pub fn from_rows(rows: impl IntoIterator<Item = CatalogRow>) -> Self {
        let mut by_database: BTreeMap<String, Vec<CatalogRow>> = BTreeMap::new();
        for row in rows {
            by_database.entry(row.database.clone()).or_default().push(row);
        }
        Self { by_database }
    }

    /// Parse snapshot text, collecting warnings for lines that fail to parse.
    pub fn parse(content: &str) -> (Self, Vec<SnapshotWarning>) {
        let mut rows = Vec::new();
        let mut warnings = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<CatalogRow>(trimmed) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!(line_number = index + 1, error = %e, "Skipping malformed snapshot line");
                    warnings.push(SnapshotWarning::MalformedLine {
                        line_number: index + 1,
                        error: e.to_string(),
                    });
                }
            }
        }

        (Self::from_rows(rows), warnings)
    }

    /// Load a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read.
    pub async fn load(path: &Path) -> Result<(Self, Vec<SnapshotWarning>)> {
        let content = fs::read_to_string(path).await?;
        let (catalog, warnings) = Self::parse(&content);
        tracing::debug!(
            path = %path.display(),
            rows = catalog.row_count(),
            warnings = warnings.len(),
            "Loaded catalog snapshot"
        );
        Ok((catalog, warnings))
    }

    /// Total rows across all databases.
    pub fn row_count(&self) -> usize {
        self.by_database.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl CatalogConnection for SnapshotCatalog {
    async fn list_databases(&self) -> std::result::Result<Vec<String>, SourceError> {
        Ok(self.by_database.keys().cloned().collect())
    }

    async fn list_objects(&self, database: &str) -> std::result::Result<Vec<CatalogRow>, SourceError> {
        Ok(self.by_database.get(database).cloned().unwrap_or_default())
    }
}

/// Write catalog rows to a snapshot file, one JSON object per line.
///
/// # Errors
///
/// Returns `Error::Io` on write failure and `Error::Json` if a row fails to
/// serialize.
pub async fn write_snapshot(path: &Path, rows: &[CatalogRow]) -> Result<()> {
    let file = fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);

    for row in rows {
        let line = serde_json::to_string(row)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }

    writer.flush().await?;
    Ok(())
}
