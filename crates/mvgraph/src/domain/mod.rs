//! Domain types for dependency discovery.
//!
//! This module contains the strongly-typed model every other component works
//! with. Raw catalog rows are converted into these types at the collector
//! boundary and never travel further.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::Error;

/// Databases holding warehouse internals rather than user data.
pub const SYSTEM_DATABASES: &[&str] = &["system", "information_schema", "INFORMATION_SCHEMA"];

/// Engine name reported by the catalog for materialized views.
pub const MATERIALIZED_VIEW_ENGINE: &str = "MaterializedView";

/// TTL marker written into table comments for expiring tables.
static EXPIRES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"expires_at=(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2})Z").expect("static regex")
});

/// Returns true if `database` is one of the warehouse's system databases.
pub fn is_system_database(database: &str) -> bool {
    SYSTEM_DATABASES.contains(&database)
}

/// Identifies a table or view by database and name.
///
/// Ordering is lexical by database, then name. That order is used anywhere a
/// deterministic result is needed (top-K ties, cycle normalization, exports).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Database (schema) containing the object
    pub database: String,

    /// Object name within the database
    pub name: String,
}

impl TableRef {
    /// Create a new table reference
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }

    /// Fully qualified `database.name` form
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

impl FromStr for TableRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('.') {
            Some((database, name)) if !database.is_empty() && !name.is_empty() => {
                Ok(Self::new(database.trim_matches('`'), name.trim_matches('`')))
            }
            _ => Err(Error::InvalidTableRef(trimmed.to_string())),
        }
    }
}

/// Kind of catalog object behind a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// Ordinary persistent table
    Table,

    /// Materialized view
    MaterializedView,

    /// Temporary table (session scoped, or carrying an expiry marker)
    Temporary,

    /// Referenced by a view but not present in the discovered catalog scope
    Unknown,
}

impl ObjectKind {
    /// Classify a catalog object from its engine, temporary flag and comment.
    pub fn classify(engine: &str, is_temporary: bool, comment: &str) -> Self {
        if engine == MATERIALIZED_VIEW_ENGINE {
            Self::MaterializedView
        } else if is_temporary || parse_expires_at(comment).is_some() {
            Self::Temporary
        } else {
            Self::Table
        }
    }

    /// Stable lowercase label used in exports and output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::MaterializedView => "materialized-view",
            Self::Temporary => "temporary",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about one catalog object, as produced by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    /// Which object this record describes
    pub table_ref: TableRef,

    /// Object kind
    pub kind: ObjectKind,

    /// Raw engine name (e.g. `MergeTree`), empty for placeholders
    pub engine: String,

    /// Defining query text; empty unless `kind` is a materialized view
    pub defining_query: String,

    /// Approximate row count
    pub row_count: u64,

    /// Approximate on-disk size
    pub size_bytes: u64,

    /// Last metadata modification time, when the catalog reports one
    pub last_modified: Option<DateTime<Utc>>,

    /// Table comment
    pub comment: String,

    /// Expiry parsed from the comment's TTL marker
    pub expires_at: Option<DateTime<Utc>>,
}

impl DiscoveryRecord {
    /// Create a record with empty metadata.
    pub fn new(table_ref: TableRef, kind: ObjectKind) -> Self {
        Self {
            table_ref,
            kind,
            engine: String::new(),
            defining_query: String::new(),
            row_count: 0,
            size_bytes: 0,
            last_modified: None,
            comment: String::new(),
            expires_at: None,
        }
    }

    /// Create a placeholder record for a referenced but undiscovered table.
    pub fn placeholder(table_ref: TableRef) -> Self {
        Self::new(table_ref, ObjectKind::Unknown)
    }

    /// Set the defining query (builder style).
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.defining_query = query.into();
        self
    }

    /// Returns true for materialized views.
    pub fn is_view(&self) -> bool {
        self.kind == ObjectKind::MaterializedView
    }

    /// Returns true if the TTL marker says this table has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Parse the `expires_at=YYYY-MM-DDTHH:MM:SSZ` marker from a table comment.
///
/// Returns `None` when the comment carries no marker or the timestamp is not
/// a valid date.
pub fn parse_expires_at(comment: &str) -> Option<DateTime<Utc>> {
    let captures = EXPIRES_RE.captures(comment)?;
    let raw = captures.get(1)?.as_str();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Returns true if `comment` carries a TTL marker that has passed at `now`.
pub fn is_expired(comment: &str, now: DateTime<Utc>) -> bool {
    parse_expires_at(comment).is_some_and(|at| now >= at)
}
