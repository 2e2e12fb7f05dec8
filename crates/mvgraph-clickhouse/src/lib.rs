//! ClickHouse catalog connection for mvgraph.
//!
//! [`ClickHouseCatalog`] implements [`CatalogConnection`] over the HTTP
//! interface by reading `system.databases` and `system.tables`. It issues
//! read-only queries and never modifies the warehouse.
//!
//! ```no_run
//! use mvgraph::config::ConnectionConfig;
//! use mvgraph::{DiscoveryOptions, discover};
//! use mvgraph_clickhouse::ClickHouseCatalog;
//!
//! # async fn run() -> mvgraph::Result<()> {
//! let catalog = ClickHouseCatalog::from_config(&ConnectionConfig::default());
//! let discovery = discover(&catalog, &DiscoveryOptions::default()).await?;
//! println!("{} views", discovery.graph.health_report().total_views);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Client;
use mvgraph::catalog::{CatalogConnection, CatalogRow, SourceError};
use mvgraph::config::ConnectionConfig;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when the config carries no password
pub const PASSWORD_ENV_VAR: &str = "CLICKHOUSE_PASSWORD";

const LIST_DATABASES: &str = "SELECT name FROM system.databases ORDER BY name";

const LIST_OBJECTS: &str = "\
    SELECT database, name, engine, is_temporary, create_table_query, comment, \
           total_rows, total_bytes, \
           toUInt32(metadata_modification_time) AS modified \
    FROM system.tables \
    WHERE database = ? \
    ORDER BY name";

/// Error codes ClickHouse returns for missing grants.
const PERMISSION_MARKERS: &[&str] = &[
    "ACCESS_DENIED",
    "Not enough privileges",
    "Code: 497",
    "Code: 516",
];

#[derive(Debug, clickhouse::Row, Serialize, Deserialize)]
struct DatabaseRow {
    name: String,
}

#[derive(Debug, clickhouse::Row, Serialize, Deserialize)]
struct TableRow {
    database: String,
    name: String,
    engine: String,
    is_temporary: u8,
    create_table_query: String,
    comment: String,
    total_rows: Option<u64>,
    total_bytes: Option<u64>,
    modified: u32,
}

impl From<TableRow> for CatalogRow {
    fn from(row: TableRow) -> Self {
        let last_modified = (row.modified > 0)
            .then(|| DateTime::<Utc>::from_timestamp(i64::from(row.modified), 0))
            .flatten();
        Self {
            database: row.database,
            name: row.name,
            engine: row.engine,
            is_temporary: row.is_temporary != 0,
            create_query: row.create_table_query,
            comment: row.comment,
            total_rows: row.total_rows,
            total_bytes: row.total_bytes,
            last_modified,
        }
    }
}

/// Catalog connection backed by a ClickHouse HTTP client.
#[derive(Clone)]
pub struct ClickHouseCatalog {
    client: Client,
}

impl std::fmt::Debug for ClickHouseCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseCatalog").finish_non_exhaustive()
    }
}

impl ClickHouseCatalog {
    /// Wrap an already configured client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from connection settings.
    ///
    /// The password comes from the config, or from `CLICKHOUSE_PASSWORD`
    /// when the config has none.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_user(&config.user);

        let password = config
            .password
            .clone()
            .or_else(|| std::env::var(PASSWORD_ENV_VAR).ok());
        if let Some(password) = password {
            client = client.with_password(password);
        }
        if let Some(database) = &config.database {
            client = client.with_database(database);
        }

        tracing::debug!(url = %config.url, user = %config.user, "Configured ClickHouse client");
        Self::new(client)
    }
}

#[async_trait]
impl CatalogConnection for ClickHouseCatalog {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        let rows = self
            .client
            .query(LIST_DATABASES)
            .fetch_all::<DatabaseRow>()
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(|row| row.name).collect())
    }

    async fn list_objects(&self, database: &str) -> Result<Vec<CatalogRow>, SourceError> {
        let rows = self
            .client
            .query(LIST_OBJECTS)
            .bind(database)
            .fetch_all::<TableRow>()
            .await
            .map_err(classify)?;

        tracing::debug!(database, objects = rows.len(), "Read system.tables");
        Ok(rows.into_iter().map(CatalogRow::from).collect())
    }
}

/// Sort a client error into the collector's failure classes.
///
/// Transport failures mean the server is unreachable. Server-side errors
/// carry the exception text, which tells grant problems apart from other
/// query failures.
fn classify(error: clickhouse::error::Error) -> SourceError {
    use clickhouse::error::Error;

    match error {
        Error::Network(_) => SourceError::Connection(error.to_string()),
        Error::BadResponse(message) if is_permission_error(&message) => {
            SourceError::PermissionDenied(message)
        }
        Error::BadResponse(message) => SourceError::Query(message),
        other => SourceError::Query(other.to_string()),
    }
}

fn is_permission_error(message: &str) -> bool {
    PERMISSION_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}
