//! GraphML export.

use crate::graph::DependencyGraph;
use std::fmt::Write;

/// `(id, for, name, type)` of every declared attribute.
const KEYS: &[(&str, &str, &str, &str)] = &[
    ("d0", "node", "database", "string"),
    ("d1", "node", "name", "string"),
    ("d2", "node", "kind", "string"),
    ("d3", "node", "engine", "string"),
    ("d4", "node", "row_count", "long"),
    ("d5", "node", "size_bytes", "long"),
    ("d6", "edge", "kind", "string"),
    ("d7", "edge", "view", "string"),
];

impl DependencyGraph {
    /// Export as GraphML. All attribute values and text are XML-escaped.
    pub fn to_graphml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(
            "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\" \
             xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
             xsi:schemaLocation=\"http://graphml.graphdrawing.org/xmlns \
             http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd\">\n",
        );

        for (id, target, name, kind) in KEYS {
            let _ = writeln!(
                out,
                "  <key id=\"{id}\" for=\"{target}\" attr.name=\"{name}\" attr.type=\"{kind}\"/>"
            );
        }

        out.push_str("  <graph id=\"dependency_graph\" edgedefault=\"directed\">\n");

        for node in self.nodes() {
            let _ = writeln!(out, "    <node id=\"{}\">", escape(&node.table.qualified()));
            data(&mut out, "d0", &node.table.database);
            data(&mut out, "d1", &node.table.name);
            data(&mut out, "d2", node.kind().as_str());
            data(&mut out, "d3", &node.record.engine);
            data(&mut out, "d4", &node.record.row_count.to_string());
            data(&mut out, "d5", &node.record.size_bytes.to_string());
            out.push_str("    </node>\n");
        }

        for (i, edge) in self.edges().enumerate() {
            let _ = writeln!(
                out,
                "    <edge id=\"e{i}\" source=\"{}\" target=\"{}\">",
                escape(&edge.source.qualified()),
                escape(&edge.target.qualified())
            );
            data(&mut out, "d6", edge.dependency_kind.as_str());
            data(&mut out, "d7", &edge.view.qualified());
            out.push_str("    </edge>\n");
        }

        out.push_str("  </graph>\n</graphml>\n");
        out
    }
}

fn data(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "      <data key=\"{key}\">{}</data>", escape(value));
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{graph, table, view};

    #[test]
    fn declares_keys_and_lists_elements() {
        let g = graph(vec![
            table("raw.events"),
            view("staging.agg", "SELECT * FROM raw.events"),
        ]);

        let xml = g.to_graphml();
        assert_eq!(xml.matches("<key ").count(), KEYS.len());
        assert_eq!(xml.matches("<node ").count(), 2);
        assert_eq!(xml.matches("<edge ").count(), 1);
        assert!(xml.contains("<edge id=\"e0\" source=\"raw.events\" target=\"staging.agg\">"));
        assert!(xml.contains("<data key=\"d2\">materialized-view</data>"));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
