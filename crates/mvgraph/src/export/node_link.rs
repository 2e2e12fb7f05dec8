//! Node-link export, the layout NetworkX's `node_link_graph` reads.

use crate::domain::ObjectKind;
use crate::graph::{DependencyGraph, DependencyKind};
use serde::Serialize;
use std::collections::HashMap;

/// Node-link document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLinkGraph {
    /// Always true
    pub directed: bool,
    /// Always true: distinct views may link the same pair
    pub multigraph: bool,
    /// Graph-level attributes
    pub graph: HashMap<String, String>,
    /// Nodes
    pub nodes: Vec<NodeLinkNode>,
    /// Edges
    pub links: Vec<NodeLinkLink>,
}

/// Node entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLinkNode {
    /// `database.name`
    pub id: String,
    /// Display label
    pub label: String,
    /// Database
    pub database: String,
    /// Object name
    pub name: String,
    /// Object kind
    pub kind: ObjectKind,
}

/// Edge entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLinkLink {
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Index among parallel edges between the same pair
    pub key: usize,
    /// Edge kind
    pub kind: DependencyKind,
    /// Responsible view id
    pub view: String,
}

impl DependencyGraph {
    /// Export as a node-link structure.
    pub fn to_node_link(&self) -> NodeLinkGraph {
        let nodes = self
            .nodes()
            .into_iter()
            .map(|node| NodeLinkNode {
                id: node.table.qualified(),
                label: node.table.qualified(),
                database: node.table.database.clone(),
                name: node.table.name.clone(),
                kind: node.kind(),
            })
            .collect();

        let mut keys: HashMap<(String, String), usize> = HashMap::new();
        let links = self
            .edges()
            .map(|edge| {
                let source = edge.source.qualified();
                let target = edge.target.qualified();
                let counter = keys.entry((source.clone(), target.clone())).or_insert(0);
                let key = *counter;
                *counter += 1;
                NodeLinkLink {
                    source,
                    target,
                    key,
                    kind: edge.dependency_kind,
                    view: edge.view.qualified(),
                }
            })
            .collect();

        NodeLinkGraph {
            directed: true,
            multigraph: true,
            graph: HashMap::from([("name".to_string(), "dependency_graph".to_string())]),
            nodes,
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::DependencyKind;
    use crate::graph::test_support::{graph, table, view};

    #[test]
    fn links_cover_both_edge_kinds() {
        let query = |name: &str| {
            format!("CREATE MATERIALIZED VIEW raw.{name} TO raw.sink AS SELECT * FROM raw.src")
        };
        let g = graph(vec![
            table("raw.src"),
            table("raw.sink"),
            view("raw.v1", &query("v1")),
            view("raw.v2", &query("v2")),
        ]);

        let exported = g.to_node_link();
        assert!(exported.directed && exported.multigraph);
        assert_eq!(exported.nodes.len(), 4);
        assert_eq!(exported.links.len(), 4);
        assert!(exported.links.iter().all(|l| l.key == 0));
        let populates = exported
            .links
            .iter()
            .filter(|l| l.kind == DependencyKind::Populates)
            .count();
        assert_eq!(populates, 2);
    }

    #[test]
    fn label_is_qualified_name() {
        let g = graph(vec![table("raw.events")]);
        let exported = g.to_node_link();
        assert_eq!(exported.nodes[0].label, "raw.events");
        assert!(exported.links.is_empty());
    }
}
