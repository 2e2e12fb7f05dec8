//! The dependency graph and its analyses.
//!
//! # Graph Representation
//!
//! [`DependencyGraph`] wraps a petgraph `DiGraph<GraphNode, GraphEdge>` plus a
//! `HashMap<TableRef, NodeIndex>` for key lookups. Nodes never hold references
//! to each other; a node's `outgoing` and `incoming` sets are derived from
//! petgraph's adjacency lists on request.
//!
//! # Edge Direction
//!
//! Edges follow data flow:
//!
//! - [`DependencyKind::MaterializedView`]: table read by a view → the view
//! - [`DependencyKind::Populates`]: view → the table named in its `TO` clause
//!
//! "Downstream" therefore means following outgoing edges.
//!
//! # Construction
//!
//! Graphs are built once per discovery pass by [`GraphBuilder`] and never
//! mutated afterwards. Every analysis takes `&self`, so concurrent readers need
//! no coordination.

use crate::domain::{DiscoveryRecord, ObjectKind, TableRef};
use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

mod builder;
mod cycles;
mod depth;
mod health;
mod impact;
mod influence;

pub use builder::{GraphBuilder, build_graph};
pub use depth::Depth;
pub use health::{DatabaseStats, HealthReport};
pub use impact::{ImpactReport, Lineage, LineageDirection};

/// How an edge's source feeds its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    /// A materialized view reads from the source table
    MaterializedView,

    /// A materialized view writes into the target table (`TO` clause)
    Populates,
}

impl DependencyKind {
    /// Stable label used in exports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaterializedView => "materialized-view",
            Self::Populates => "populates",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table, view or placeholder in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    /// Key of this node
    pub table: TableRef,

    /// Catalog metadata (empty for placeholders)
    pub record: DiscoveryRecord,
}

impl GraphNode {
    pub(crate) fn new(record: DiscoveryRecord) -> Self {
        Self {
            table: record.table_ref.clone(),
            record,
        }
    }

    /// Object kind of this node
    pub fn kind(&self) -> ObjectKind {
        self.record.kind
    }

    /// True for materialized views
    pub fn is_view(&self) -> bool {
        self.record.is_view()
    }

    /// True for tables referenced but not discovered
    pub fn is_placeholder(&self) -> bool {
        self.record.kind == ObjectKind::Unknown
    }
}

/// A view-mediated dependency between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    /// Upstream end
    pub source: TableRef,

    /// Downstream end
    pub target: TableRef,

    /// The materialized view responsible for this edge
    pub view: TableRef,

    /// The view's defining query, for provenance
    pub view_definition: String,

    /// Edge kind
    pub dependency_kind: DependencyKind,
}

/// Directed multigraph of tables and materialized views.
///
/// Invariant: every edge endpoint has a node, and every node's key appears
/// exactly once in the index.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, GraphEdge>,
    index: HashMap<TableRef, NodeIndex>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a node unless one already exists for its key.
    ///
    /// Returns the node index and whether it was newly inserted.
    pub(crate) fn insert_node(&mut self, record: DiscoveryRecord) -> (NodeIndex, bool) {
        if let Some(&idx) = self.index.get(&record.table_ref) {
            return (idx, false);
        }
        let table = record.table_ref.clone();
        let idx = self.graph.add_node(GraphNode::new(record));
        self.index.insert(table, idx);
        (idx, true)
    }

    /// Node index for `table`, creating a placeholder node if it is missing.
    pub(crate) fn ensure_node(&mut self, table: &TableRef) -> NodeIndex {
        self.insert_node(DiscoveryRecord::placeholder(table.clone())).0
    }

    pub(crate) fn insert_edge(&mut self, edge: GraphEdge) {
        let source = self.ensure_node(&edge.source);
        let target = self.ensure_node(&edge.target);
        self.graph.add_edge(source, target, edge);
    }

    pub(crate) fn index_of(&self, table: &TableRef) -> Option<NodeIndex> {
        self.index.get(table).copied()
    }

    pub(crate) fn table_at(&self, idx: NodeIndex) -> &TableRef {
        &self.graph[idx].table
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, GraphEdge> {
        &self.graph
    }

    /// Node indices sorted by `TableRef`.
    pub(crate) fn sorted_indices(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|a, b| self.graph[*a].table.cmp(&self.graph[*b].table));
        indices
    }

    /// Distinct successor indices of `idx`, sorted by `TableRef`.
    pub(crate) fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.neighbors(idx, Direction::Outgoing)
    }

    pub(crate) fn neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        neighbors.sort_by(|a, b| self.graph[*a].table.cmp(&self.graph[*b].table));
        neighbors.dedup();
        neighbors
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges, parallel edges counted individually
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// True if the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// True if `table` has a node
    pub fn contains(&self, table: &TableRef) -> bool {
        self.index.contains_key(table)
    }

    /// Look up a node
    pub fn node(&self, table: &TableRef) -> Option<&GraphNode> {
        self.index_of(table).map(|idx| &self.graph[idx])
    }

    /// All nodes, ordered by `TableRef`
    pub fn nodes(&self) -> Vec<&GraphNode> {
        self.sorted_indices()
            .into_iter()
            .map(|idx| &self.graph[idx])
            .collect()
    }

    /// All edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.graph.edge_weights()
    }

    /// Tables this node feeds directly (its `outgoing` set).
    ///
    /// Empty for tables without a node.
    pub fn outgoing(&self, table: &TableRef) -> BTreeSet<TableRef> {
        self.adjacent(table, Direction::Outgoing)
    }

    /// Tables feeding this node directly (its `incoming` set).
    pub fn incoming(&self, table: &TableRef) -> BTreeSet<TableRef> {
        self.adjacent(table, Direction::Incoming)
    }

    fn adjacent(&self, table: &TableRef, direction: Direction) -> BTreeSet<TableRef> {
        let Some(idx) = self.index_of(table) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].table.clone())
            .collect()
    }

    /// Count of incoming edges, parallel edges included
    pub fn in_degree(&self, table: &TableRef) -> usize {
        self.degree(table, Direction::Incoming)
    }

    /// Count of outgoing edges, parallel edges included
    pub fn out_degree(&self, table: &TableRef) -> usize {
        self.degree(table, Direction::Outgoing)
    }

    fn degree(&self, table: &TableRef, direction: Direction) -> usize {
        self.index_of(table)
            .map_or(0, |idx| self.graph.edges_directed(idx, direction).count())
    }

    /// Nodes with an edge into `table`
    pub fn sources_of(&self, table: &TableRef) -> Vec<&GraphNode> {
        self.incoming(table)
            .iter()
            .filter_map(|t| self.node(t))
            .collect()
    }

    /// Nodes `table` has an edge into
    pub fn targets_of(&self, table: &TableRef) -> Vec<&GraphNode> {
        self.outgoing(table)
            .iter()
            .filter_map(|t| self.node(t))
            .collect()
    }

    /// Views responsible for any edge touching `table`.
    pub fn views_for(&self, table: &TableRef) -> BTreeSet<TableRef> {
        let Some(idx) = self.index_of(table) else {
            return BTreeSet::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|edge| edge.weight().view.clone())
            .collect()
    }

    /// Nodes belonging to `database`, ordered by name
    pub fn nodes_in_database(&self, database: &str) -> Vec<&GraphNode> {
        self.nodes()
            .into_iter()
            .filter(|node| node.table.database == database)
            .collect()
    }

    /// Nodes that take part in no dependency at all.
    pub fn orphaned_tables(&self) -> Vec<&GraphNode> {
        let involved: BTreeSet<&TableRef> = self
            .graph
            .edge_references()
            .flat_map(|edge| {
                let weight = edge.weight();
                [&weight.source, &weight.target, &weight.view]
            })
            .collect();

        self.nodes()
            .into_iter()
            .filter(|node| !involved.contains(&node.table))
            .collect()
    }

    /// Nodes whose TTL marker has passed at `now`.
    pub fn expired_tables(&self, now: DateTime<Utc>) -> Vec<&GraphNode> {
        self.nodes()
            .into_iter()
            .filter(|node| node.record.is_expired(now))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Record for a plain table
    pub fn table(qualified: &str) -> DiscoveryRecord {
        DiscoveryRecord::new(parse(qualified), ObjectKind::Table)
    }

    /// Record for a view with the given query
    pub fn view(qualified: &str, query: &str) -> DiscoveryRecord {
        DiscoveryRecord::new(parse(qualified), ObjectKind::MaterializedView).with_query(query)
    }

    pub fn parse(qualified: &str) -> TableRef {
        qualified.parse().unwrap_or_else(|_| panic!("bad table ref {qualified}"))
    }

    /// Build a graph from records, analyzing each view's query.
    pub fn graph(records: Vec<DiscoveryRecord>) -> DependencyGraph {
        let references: Vec<_> = records
            .iter()
            .filter(|r| r.is_view())
            .map(|r| (r.table_ref.clone(), crate::analyzer::analyze_view(r)))
            .collect();
        build_graph(records, references).0
    }
}
