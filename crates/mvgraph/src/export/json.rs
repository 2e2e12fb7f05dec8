//! Adjacency JSON export.

use crate::domain::ObjectKind;
use crate::error::Result;
use crate::graph::{DependencyGraph, DependencyKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Top-level JSON document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonExport {
    /// One entry per node, ordered by table
    pub nodes: Vec<JsonNode>,
    /// One entry per edge, in graph order
    pub edges: Vec<JsonEdge>,
    /// Summary counts
    pub metadata: JsonMetadata,
}

/// A node with its metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonNode {
    /// `database.name`
    pub id: String,
    /// Database
    pub database: String,
    /// Object name
    pub name: String,
    /// Object kind
    pub kind: ObjectKind,
    /// Raw engine name
    pub engine: String,
    /// Approximate row count
    pub row_count: u64,
    /// Approximate size in bytes
    pub size_bytes: u64,
    /// Last metadata change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Incoming edges
    pub in_degree: usize,
    /// Outgoing edges
    pub out_degree: usize,
    /// Influence score
    pub score: usize,
}

/// An edge with view provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonEdge {
    /// Upstream node id
    pub source: String,
    /// Downstream node id
    pub target: String,
    /// Responsible view id
    pub view: String,
    /// Edge kind
    pub kind: DependencyKind,
    /// The view's defining query
    pub view_definition: String,
}

/// Export-level counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonMetadata {
    /// Node count
    pub total_nodes: usize,
    /// Edge count
    pub total_edges: usize,
    /// Databases present
    pub databases: BTreeSet<String>,
}

impl DependencyGraph {
    /// The JSON export as a typed document.
    pub fn to_json_export(&self) -> JsonExport {
        let nodes: Vec<JsonNode> = self
            .nodes()
            .into_iter()
            .map(|node| JsonNode {
                id: node.table.qualified(),
                database: node.table.database.clone(),
                name: node.table.name.clone(),
                kind: node.kind(),
                engine: node.record.engine.clone(),
                row_count: node.record.row_count,
                size_bytes: node.record.size_bytes,
                last_modified: node.record.last_modified,
                in_degree: self.in_degree(&node.table),
                out_degree: self.out_degree(&node.table),
                score: self.influence_score(&node.table),
            })
            .collect();

        let edges: Vec<JsonEdge> = self
            .edges()
            .map(|edge| JsonEdge {
                source: edge.source.qualified(),
                target: edge.target.qualified(),
                view: edge.view.qualified(),
                kind: edge.dependency_kind,
                view_definition: edge.view_definition.clone(),
            })
            .collect();

        let metadata = JsonMetadata {
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            databases: nodes.iter().map(|n| n.database.clone()).collect(),
        };

        JsonExport {
            nodes,
            edges,
            metadata,
        }
    }

    /// The JSON export as a `serde_json::Value`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.to_json_export())?)
    }

    /// The JSON export as text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let export = self.to_json_export();
        let text = if pretty {
            serde_json::to_string_pretty(&export)?
        } else {
            serde_json::to_string(&export)?
        };
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::test_support::{graph, table, view};

    #[test]
    fn nodes_carry_metrics() {
        let g = graph(vec![
            table("raw.events"),
            view("staging.agg", "SELECT * FROM raw.events"),
        ]);

        let value = g.to_json_value().unwrap();
        let nodes = value["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["id"], "raw.events");
        assert_eq!(nodes[0]["out_degree"], 1);
        assert_eq!(nodes[1]["kind"], "materialized-view");
        assert_eq!(nodes[1]["score"], 2);
        assert_eq!(value["edges"][0]["view"], "staging.agg");
        assert_eq!(value["metadata"]["total_edges"], 1);
    }

    #[test]
    fn compact_and_pretty_hold_the_same_document() {
        let g = graph(vec![table("raw.events")]);
        let compact: serde_json::Value = serde_json::from_str(&g.to_json(false).unwrap()).unwrap();
        let pretty: serde_json::Value = serde_json::from_str(&g.to_json(true).unwrap()).unwrap();
        assert_eq!(compact, pretty);
    }
}
