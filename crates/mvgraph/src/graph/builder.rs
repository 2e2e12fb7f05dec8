//! Graph construction from discovery records and view references.

use super::{DependencyGraph, DependencyKind, GraphEdge};
use crate::analyzer::ViewReferences;
use crate::discovery::DiscoveryIssue;
use crate::domain::{DiscoveryRecord, TableRef};
use std::collections::BTreeMap;

/// Assembles a [`DependencyGraph`].
///
/// Pure: no I/O, and the same inputs always produce the same graph.
///
/// ```rust,ignore
/// let (graph, issues) = GraphBuilder::new()
///     .add_records(records)
///     .add_view_references(view, references)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    records: Vec<DiscoveryRecord>,
    references: BTreeMap<TableRef, ViewReferences>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add discovery records. Later duplicates of a `TableRef` are dropped.
    #[must_use]
    pub fn add_records(mut self, records: impl IntoIterator<Item = DiscoveryRecord>) -> Self {
        self.records.extend(records);
        self
    }

    /// Attach the references extracted from one view's definition.
    #[must_use]
    pub fn add_view_references(mut self, view: TableRef, references: ViewReferences) -> Self {
        self.references.insert(view, references);
        self
    }

    /// Build the graph, returning it with the issues found along the way.
    pub fn build(self) -> (DependencyGraph, Vec<DiscoveryIssue>) {
        let mut graph = DependencyGraph::new();
        let mut issues = Vec::new();

        for record in self.records {
            let table = record.table_ref.clone();
            let (_, inserted) = graph.insert_node(record);
            if !inserted {
                issues.push(DiscoveryIssue::DuplicateRecord { table });
            }
        }

        for (view, references) in self.references {
            graph.ensure_node(&view);
            let definition = graph
                .node(&view)
                .map(|node| node.record.defining_query.clone())
                .unwrap_or_default();

            if let Some(reason) = references.warning {
                issues.push(DiscoveryIssue::UnparseableView {
                    view: view.clone(),
                    reason,
                });
            }

            for source in references.sources {
                graph.insert_edge(GraphEdge {
                    source,
                    target: view.clone(),
                    view: view.clone(),
                    view_definition: definition.clone(),
                    dependency_kind: DependencyKind::MaterializedView,
                });
            }

            if let Some(target) = references.target {
                graph.insert_edge(GraphEdge {
                    source: view.clone(),
                    target,
                    view: view.clone(),
                    view_definition: definition,
                    dependency_kind: DependencyKind::Populates,
                });
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            issues = issues.len(),
            "Built dependency graph"
        );

        (graph, issues)
    }
}

/// Build a graph from records and per-view references.
pub fn build_graph(
    records: impl IntoIterator<Item = DiscoveryRecord>,
    references: impl IntoIterator<Item = (TableRef, ViewReferences)>,
) -> (DependencyGraph, Vec<DiscoveryIssue>) {
    references
        .into_iter()
        .fold(GraphBuilder::new().add_records(records), |builder, (view, refs)| {
            builder.add_view_references(view, refs)
        })
        .build()
}
