//! Graphviz DOT export.

use crate::domain::ObjectKind;
use crate::graph::{DependencyGraph, DependencyKind};
use std::fmt::Write;

impl DependencyGraph {
    /// Export as a Graphviz `digraph`.
    ///
    /// Node ids are the quoted qualified names. Views are blue, tables green,
    /// temporary tables yellow and placeholders dashed grey. Edges are labeled
    /// with the responsible view's name.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph dependency_graph {\n");
        out.push_str("  rankdir=LR;\n");
        out.push_str("  node [shape=box, style=filled];\n\n");

        for node in self.nodes() {
            let id = quote(&node.table.qualified());
            let style = match node.kind() {
                ObjectKind::MaterializedView => "fillcolor=lightblue",
                ObjectKind::Table => "fillcolor=lightgreen",
                ObjectKind::Temporary => "fillcolor=lightyellow",
                ObjectKind::Unknown => "fillcolor=lightgrey, style=\"filled,dashed\"",
            };
            let _ = writeln!(out, "  {id} [label={id}, {style}];");
        }

        out.push('\n');

        for edge in self.edges() {
            let source = quote(&edge.source.qualified());
            let target = quote(&edge.target.qualified());
            let label = quote(&edge.view.name);
            let style = match edge.dependency_kind {
                DependencyKind::MaterializedView => "",
                DependencyKind::Populates => ", style=dashed",
            };
            let _ = writeln!(out, "  {source} -> {target} [label={label}{style}];");
        }

        out.push_str("}\n");
        out
    }
}

/// Quote a DOT identifier.
fn quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{graph, table, view};

    #[test]
    fn lists_every_node_and_edge() {
        let g = graph(vec![
            table("raw.events"),
            view("staging.agg", "SELECT * FROM raw.events JOIN missing.dim ON 1"),
        ]);

        let dot = g.to_dot();
        assert!(dot.starts_with("digraph dependency_graph {"));
        assert_eq!(dot.matches(" -> ").count(), g.edge_count());
        assert_eq!(dot.matches("[label=").count(), g.node_count() + g.edge_count());
        assert!(dot.contains("\"raw.events\" -> \"staging.agg\" [label=\"agg\"];"));
        assert!(dot.contains("\"missing.dim\" [label=\"missing.dim\", fillcolor=lightgrey"));
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(quote("we\"ird"), "\"we\\\"ird\"");
    }
}
