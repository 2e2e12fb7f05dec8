//! Catalog access abstraction.
//!
//! The engine never talks to a warehouse directly. It consumes a
//! [`CatalogConnection`], a read-only capability that lists databases and
//! returns the catalog rows of one database. Implementations:
//!
//! - **`ClickHouseCatalog`** (crate `mvgraph-clickhouse`): live `system.tables` queries
//! - **[`SnapshotCatalog`]**: catalog rows captured to a JSON Lines file
//! - **`MockCatalog`**: scripted rows, failures and latency for tests
//!
//! # Test Utilities
//!
//! `MockCatalog` is available to downstream crates with the `test-util`
//! feature:
//!
//! ```toml
//! [dev-dependencies]
//! mvgraph = { version = "...", features = ["test-util"] }
//! ```
//!
//! # Thread Safety
//!
//! Connections must be `Send + Sync`: the collector issues per-database
//! queries concurrently through a shared reference.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod snapshot;

#[cfg(any(test, feature = "test-util"))]
mod mock;

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockCatalog;
pub use snapshot::{SnapshotCatalog, SnapshotWarning};

/// Failure reported by a catalog connection.
///
/// `Connection` means the warehouse itself is unreachable and aborts the
/// whole discovery. The other variants are local to the database being
/// queried; the collector skips that database and continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The warehouse could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The session may not read this database's catalog.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The catalog query failed for another reason.
    #[error("query failed: {0}")]
    Query(String),
}

impl SourceError {
    /// Returns true if this failure must abort discovery.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// One raw row of catalog metadata.
///
/// Mirrors what a warehouse catalog (e.g. `system.tables`) returns. The
/// collector converts rows into [`DiscoveryRecord`](crate::domain::DiscoveryRecord)s;
/// nothing downstream of it sees this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    /// Database name
    pub database: String,

    /// Object name
    pub name: String,

    /// Storage engine (e.g. `MergeTree`, `MaterializedView`)
    #[serde(default)]
    pub engine: String,

    /// Session-scoped temporary table flag
    #[serde(default)]
    pub is_temporary: bool,

    /// `CREATE` statement (or bare `SELECT`) for views
    #[serde(default)]
    pub create_query: String,

    /// Table comment
    #[serde(default)]
    pub comment: String,

    /// Approximate row count, if known
    #[serde(default)]
    pub total_rows: Option<u64>,

    /// Approximate size on disk, if known
    #[serde(default)]
    pub total_bytes: Option<u64>,

    /// Last metadata modification, if known
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl CatalogRow {
    /// Row for an ordinary `MergeTree` table.
    pub fn table(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            engine: "MergeTree".to_string(),
            is_temporary: false,
            create_query: String::new(),
            comment: String::new(),
            total_rows: None,
            total_bytes: None,
            last_modified: None,
        }
    }

    /// Row for a materialized view with the given defining query.
    pub fn view(
        database: impl Into<String>,
        name: impl Into<String>,
        create_query: impl Into<String>,
    ) -> Self {
        Self {
            engine: crate::domain::MATERIALIZED_VIEW_ENGINE.to_string(),
            create_query: create_query.into(),
            ..Self::table(database, name)
        }
    }

    /// Row for a session-scoped temporary table.
    pub fn temporary(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            engine: "Memory".to_string(),
            is_temporary: true,
            ..Self::table(database, name)
        }
    }
}

/// Read-only access to a warehouse catalog.
///
/// # Errors
///
/// Both methods return [`SourceError`]. `list_databases` failing is always
/// treated as a connection failure by the collector.
#[async_trait]
pub trait CatalogConnection: Send + Sync {
    /// List every database visible to the session, system databases included.
    async fn list_databases(&self) -> Result<Vec<String>, SourceError>;

    /// List the tables, views and temporary tables of one database.
    async fn list_objects(&self, database: &str) -> Result<Vec<CatalogRow>, SourceError>;
}

#[async_trait]
impl<T: CatalogConnection + ?Sized> CatalogConnection for &T {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        (**self).list_databases().await
    }

    async fn list_objects(&self, database: &str) -> Result<Vec<CatalogRow>, SourceError> {
        (**self).list_objects(database).await
    }
}

#[async_trait]
impl<T: CatalogConnection + ?Sized> CatalogConnection for Box<T> {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        (**self).list_databases().await
    }

    async fn list_objects(&self, database: &str) -> Result<Vec<CatalogRow>, SourceError> {
        (**self).list_objects(database).await
    }
}
