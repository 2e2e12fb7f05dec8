//! Discovery entry point: collect, analyze, build.
//!
//! ```text
//! CatalogConnection ─► collector ─► analyzer (per view) ─► builder ─► Discovery
//! ```
//!
//! Discovery returns a best-effort graph together with every non-fatal
//! problem met on the way. Only losing the warehouse connection is an error.

use crate::analyzer::analyze_view;
use crate::catalog::{CatalogConnection, SnapshotWarning};
use crate::collector::collect;
use crate::config::DiscoveryOptions;
use crate::domain::TableRef;
use crate::error::Result;
use crate::graph::{DependencyGraph, build_graph};
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// A problem discovery recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryIssue {
    /// A database's catalog could not be read.
    ///
    /// **Effect**: none of its objects are in the graph, except as placeholders.
    DatabaseSkipped {
        /// Database name
        database: String,
        /// Failure description
        reason: String,
    },

    /// No source table could be recognized in a view definition.
    ///
    /// **Effect**: the view is a node with no incoming edges.
    UnparseableView {
        /// The view
        view: TableRef,
        /// Why extraction failed
        reason: String,
    },

    /// The catalog returned the same object twice.
    ///
    /// **Effect**: the first record is kept.
    DuplicateRecord {
        /// The repeated table
        table: TableRef,
    },

    /// Discovery was cancelled before these databases were read.
    Cancelled {
        /// Databases never queried or still in flight
        pending_databases: Vec<String>,
    },

    /// A snapshot line could not be parsed.
    ///
    /// **Effect**: that catalog row is missing.
    MalformedSnapshotLine {
        /// The 1-based line number
        line_number: usize,
        /// Parser error description
        error: String,
    },
}

impl fmt::Display for DiscoveryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseSkipped { database, reason } => {
                write!(f, "skipped database '{database}': {reason}")
            }
            Self::UnparseableView { view, reason } => {
                write!(f, "no sources for view {view}: {reason}")
            }
            Self::DuplicateRecord { table } => write!(f, "duplicate catalog record for {table}"),
            Self::Cancelled { pending_databases } => write!(
                f,
                "cancelled before reading {} database(s): {}",
                pending_databases.len(),
                pending_databases.join(", ")
            ),
            Self::MalformedSnapshotLine { line_number, error } => {
                write!(f, "snapshot line {line_number}: {error}")
            }
        }
    }
}

impl From<SnapshotWarning> for DiscoveryIssue {
    fn from(warning: SnapshotWarning) -> Self {
        match warning {
            SnapshotWarning::MalformedLine { line_number, error } => {
                Self::MalformedSnapshotLine { line_number, error }
            }
        }
    }
}

/// Outcome of a discovery pass.
#[derive(Debug, Clone)]
pub struct Discovery {
    /// The dependency graph
    pub graph: DependencyGraph,

    /// Non-fatal problems, in the order they were found
    pub issues: Vec<DiscoveryIssue>,
}

impl Discovery {
    /// True if discovery met no problem at all
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    /// True if discovery was cut short by cancellation
    pub fn was_cancelled(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, DiscoveryIssue::Cancelled { .. }))
    }
}

/// Discover the dependency graph visible through `conn`.
///
/// # Errors
///
/// Returns `Error::Connection` if the warehouse cannot be reached.
pub async fn discover<C>(conn: &C, options: &DiscoveryOptions) -> Result<Discovery>
where
    C: CatalogConnection + ?Sized,
{
    discover_with_cancellation(conn, options, &CancellationToken::new()).await
}

/// Like [`discover`], stopping early when `cancel` fires.
///
/// Records collected before cancellation are still built into the graph.
///
/// # Errors
///
/// Returns `Error::Connection` if the warehouse cannot be reached.
pub async fn discover_with_cancellation<C>(
    conn: &C,
    options: &DiscoveryOptions,
    cancel: &CancellationToken,
) -> Result<Discovery>
where
    C: CatalogConnection + ?Sized,
{
    let collection = collect(conn, options, cancel).await?;

    let references: Vec<_> = collection
        .records
        .iter()
        .filter(|record| record.is_view())
        .map(|record| (record.table_ref.clone(), analyze_view(record)))
        .collect();

    let (graph, build_issues) = build_graph(collection.records, references);

    let mut issues = collection.issues;
    issues.extend(build_issues);

    for issue in &issues {
        tracing::warn!(%issue, "Discovery issue");
    }

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        issues = issues.len(),
        "Discovery complete"
    );

    Ok(Discovery { graph, issues })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_render_readably() {
        let issue = DiscoveryIssue::Cancelled {
            pending_databases: vec!["a".into(), "b".into()],
        };
        assert_eq!(issue.to_string(), "cancelled before reading 2 database(s): a, b");
    }

    #[test]
    fn issues_serialize_with_type_tag() {
        let issue = DiscoveryIssue::DuplicateRecord {
            table: TableRef::new("raw", "events"),
        };
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "duplicate_record");
        assert_eq!(value["table"]["name"], "events");
    }

    #[test]
    fn snapshot_warnings_convert() {
        let issue: DiscoveryIssue = SnapshotWarning::MalformedLine {
            line_number: 3,
            error: "EOF".into(),
        }
        .into();
        assert_eq!(
            issue,
            DiscoveryIssue::MalformedSnapshotLine {
                line_number: 3,
                error: "EOF".into()
            }
        );
    }
}
