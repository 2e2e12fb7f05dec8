//! Metadata collection across databases.
//!
//! The collector turns catalog rows into [`DiscoveryRecord`]s. It is the only
//! place raw [`CatalogRow`]s are read.
//!
//! ## Scheduling
//!
//! ```text
//! databases ──► buffer_unordered(limit) ──► single consumer ──► records + issues
//!               (timeout per query)          (sole writer)
//! ```
//!
//! Per-database queries run concurrently up to `concurrency_limit`. Workers
//! only produce outcomes; the consuming loop is the only writer of the result
//! vectors.
//!
//! ## Failure policy
//!
//! | Condition | Effect |
//! |-----------|--------|
//! | `list_databases` fails | fatal, `Error::Connection` |
//! | per-database `SourceError::Connection` | fatal, `Error::Connection` |
//! | permission / query failure, timeout | database skipped, `DatabaseSkipped` issue |
//! | cancellation | no new queries, partial records kept, `Cancelled` issue |

use crate::catalog::{CatalogConnection, CatalogRow, SourceError};
use crate::config::DiscoveryOptions;
use crate::discovery::DiscoveryIssue;
use crate::domain::{DiscoveryRecord, ObjectKind, TableRef, is_system_database, parse_expires_at};
use crate::error::{Error, Result};
use futures::StreamExt;
use futures::stream;
use std::collections::HashSet;
use std::pin::pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Records and non-fatal issues produced by one collection pass.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Discovered objects, ordered by `TableRef`
    pub records: Vec<DiscoveryRecord>,

    /// Problems that were recovered from
    pub issues: Vec<DiscoveryIssue>,
}

/// Raw catalog rows gathered under the same policy as [`collect`].
///
/// Used to capture snapshots, where rows must be kept as the catalog
/// returned them.
#[derive(Debug, Clone, Default)]
pub struct RowCollection {
    /// Catalog rows, ordered by database then name
    pub rows: Vec<CatalogRow>,

    /// Problems that were recovered from
    pub issues: Vec<DiscoveryIssue>,
}

/// What happened to one database's catalog query.
enum Outcome {
    Rows(Vec<CatalogRow>),
    Failed(SourceError),
    TimedOut(Duration),
    NotStarted,
}

/// Collect discovery records from the given connection.
///
/// # Errors
///
/// Returns `Error::Connection` when the warehouse is unreachable: either the
/// database listing fails or a per-database query reports a connection
/// failure. Every other failure is recorded in [`Collection::issues`].
pub async fn collect<C>(
    conn: &C,
    options: &DiscoveryOptions,
    cancel: &CancellationToken,
) -> Result<Collection>
where
    C: CatalogConnection + ?Sized,
{
    let RowCollection { rows, issues } = collect_rows(conn, options, cancel).await?;

    let mut records: Vec<DiscoveryRecord> = rows.into_iter().map(to_record).collect();
    records.sort_by(|a, b| a.table_ref.cmp(&b.table_ref));

    tracing::info!(
        records = records.len(),
        issues = issues.len(),
        "Catalog collection complete"
    );

    Ok(Collection { records, issues })
}

/// Collect raw catalog rows from the given connection.
///
/// Temporary objects are dropped unless `options.include_temp` is set.
///
/// # Errors
///
/// Same as [`collect`].
pub async fn collect_rows<C>(
    conn: &C,
    options: &DiscoveryOptions,
    cancel: &CancellationToken,
) -> Result<RowCollection>
where
    C: CatalogConnection + ?Sized,
{
    let databases = resolve_databases(conn, options).await?;
    let limit = options.effective_concurrency();

    tracing::info!(
        databases = databases.len(),
        concurrency = limit,
        "Collecting catalog metadata"
    );

    let timeout = options.query_timeout;
    let outcomes = stream::iter(databases.iter().cloned())
        .map(|database| async move {
            if cancel.is_cancelled() {
                return (database, Outcome::NotStarted);
            }
            tracing::debug!(database = %database, "Querying catalog");
            let outcome = match tokio::time::timeout(timeout, conn.list_objects(&database)).await {
                Ok(Ok(rows)) => Outcome::Rows(rows),
                Ok(Err(e)) => Outcome::Failed(e),
                Err(_) => Outcome::TimedOut(timeout),
            };
            (database, outcome)
        })
        .buffer_unordered(limit)
        .take_until(cancel.cancelled());
    let mut outcomes = pin!(outcomes);

    let mut collection = RowCollection::default();
    let mut finished: HashSet<String> = HashSet::new();

    while let Some((database, outcome)) = outcomes.next().await {
        match outcome {
            Outcome::Rows(rows) => {
                let before = collection.rows.len();
                collection
                    .rows
                    .extend(rows.into_iter().filter(|row| options.include_temp || !is_temporary(row)));
                tracing::debug!(
                    database = %database,
                    rows = collection.rows.len() - before,
                    "Collected database"
                );
            }
            Outcome::Failed(e) if e.is_fatal() => {
                tracing::error!(database = %database, error = %e, "Lost connection during discovery");
                return Err(Error::Connection(e.to_string()));
            }
            Outcome::Failed(e) => {
                collection.issues.push(DiscoveryIssue::DatabaseSkipped {
                    database: database.clone(),
                    reason: e.to_string(),
                });
            }
            Outcome::TimedOut(after) => {
                collection.issues.push(DiscoveryIssue::DatabaseSkipped {
                    database: database.clone(),
                    reason: format!("catalog query timed out after {}s", after.as_secs_f64()),
                });
            }
            Outcome::NotStarted => continue,
        }
        finished.insert(database);
    }

    if cancel.is_cancelled() {
        let pending: Vec<String> = databases
            .iter()
            .filter(|database| !finished.contains(*database))
            .cloned()
            .collect();
        if !pending.is_empty() {
            collection.issues.push(DiscoveryIssue::Cancelled {
                pending_databases: pending,
            });
        }
    }

    collection
        .rows
        .sort_by(|a, b| (&a.database, &a.name).cmp(&(&b.database, &b.name)));

    Ok(collection)
}

fn is_temporary(row: &CatalogRow) -> bool {
    ObjectKind::classify(&row.engine, row.is_temporary, &row.comment) == ObjectKind::Temporary
}

/// Decide which databases to scan.
async fn resolve_databases<C>(conn: &C, options: &DiscoveryOptions) -> Result<Vec<String>>
where
    C: CatalogConnection + ?Sized,
{
    if !options.databases.is_empty() {
        let mut seen = HashSet::new();
        return Ok(options
            .databases
            .iter()
            .filter(|database| seen.insert(database.as_str()))
            .cloned()
            .collect());
    }

    let all = conn
        .list_databases()
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    Ok(all
        .into_iter()
        .filter(|database| options.include_system || !is_system_database(database))
        .collect())
}

/// Convert one catalog row into a typed record.
fn to_record(row: CatalogRow) -> DiscoveryRecord {
    let kind = ObjectKind::classify(&row.engine, row.is_temporary, &row.comment);
    let expires_at = parse_expires_at(&row.comment);

    DiscoveryRecord {
        table_ref: TableRef::new(row.database, row.name),
        kind,
        engine: row.engine,
        defining_query: if kind == ObjectKind::MaterializedView {
            row.create_query
        } else {
            String::new()
        },
        row_count: row.total_rows.unwrap_or(0),
        size_bytes: row.total_bytes.unwrap_or(0),
        last_modified: row.last_modified,
        comment: row.comment,
        expires_at,
    }
}
