//! Cycle detection.
//!
//! Depth-first search with a recursion stack: an edge back to a node that is
//! still on the stack closes a cycle, which is the stack slice from that node
//! to the top. Nodes and neighbors are visited in `TableRef` order, and each
//! cycle is rotated to start at its smallest member so one cycle found from
//! two entry points is reported once.

use super::DependencyGraph;
use crate::domain::TableRef;
use petgraph::graph::NodeIndex;
use std::collections::HashSet;

impl DependencyGraph {
    /// Every distinct cycle, as the participating tables in traversal order.
    ///
    /// A view reading its own output is a one-node cycle.
    pub fn find_cycles(&self) -> Vec<Vec<TableRef>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();
        let mut found = Vec::new();

        for start in self.sorted_indices() {
            if !visited.contains(&start) {
                self.visit_for_cycles(start, &mut visited, &mut on_stack, &mut path, &mut found);
            }
        }

        let cycles = deduplicate_cycles(found);
        if !cycles.is_empty() {
            tracing::debug!(cycles = cycles.len(), "Detected dependency cycles");
        }
        cycles
    }

    /// True if `table` sits on some cycle.
    pub fn is_in_cycle(&self, table: &TableRef) -> bool {
        self.find_cycles().iter().any(|cycle| cycle.contains(table))
    }

    fn visit_for_cycles(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
        found: &mut Vec<Vec<TableRef>>,
    ) {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for neighbor in self.successors(node) {
            if !visited.contains(&neighbor) {
                self.visit_for_cycles(neighbor, visited, on_stack, path, found);
            } else if on_stack.contains(&neighbor) {
                if let Some(start) = path.iter().position(|&idx| idx == neighbor) {
                    found.push(
                        path[start..]
                            .iter()
                            .map(|&idx| self.table_at(idx).clone())
                            .collect(),
                    );
                }
            }
        }

        path.pop();
        on_stack.remove(&node);
    }
}

fn deduplicate_cycles(cycles: Vec<Vec<TableRef>>) -> Vec<Vec<TableRef>> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for cycle in cycles {
        if cycle.is_empty() {
            continue;
        }
        let normalized = normalize_cycle(&cycle);
        if seen.insert(normalized.clone()) {
            unique.push(normalized);
        }
    }

    unique
}

/// Rotate so the smallest `TableRef` comes first.
fn normalize_cycle(cycle: &[TableRef]) -> Vec<TableRef> {
    let min_idx = cycle
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);

    let mut normalized = Vec::with_capacity(cycle.len());
    normalized.extend_from_slice(&cycle[min_idx..]);
    normalized.extend_from_slice(&cycle[..min_idx]);
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{graph, parse, table, view};

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(vec![
            table("raw.events"),
            view("staging.agg", "SELECT * FROM raw.events"),
        ]);
        assert!(g.find_cycles().is_empty());
    }

    #[test]
    fn two_views_reading_each_other() {
        let g = graph(vec![
            view("analytics.a", "SELECT * FROM analytics.b"),
            view("analytics.b", "SELECT * FROM analytics.a"),
        ]);

        assert_eq!(
            g.find_cycles(),
            vec![vec![parse("analytics.a"), parse("analytics.b")]]
        );
        assert!(g.is_in_cycle(&parse("analytics.b")));
    }

    #[test]
    fn self_loop_is_single_node_cycle() {
        let g = graph(vec![view("raw.loop", "SELECT * FROM raw.loop")]);
        assert_eq!(g.find_cycles(), vec![vec![parse("raw.loop")]]);
    }

    #[test]
    fn separate_cycles_are_all_reported() {
        let g = graph(vec![
            view("a.x", "SELECT * FROM a.y"),
            view("a.y", "SELECT * FROM a.x"),
            view("b.x", "SELECT * FROM b.x"),
        ]);
        assert_eq!(g.find_cycles().len(), 2);
    }

    #[test]
    fn normalize_rotates_to_smallest() {
        let cycle = vec![parse("c.c"), parse("a.a"), parse("b.b")];
        assert_eq!(
            normalize_cycle(&cycle),
            vec![parse("a.a"), parse("b.b"), parse("c.c")]
        );
    }

    #[test]
    fn rotations_deduplicate() {
        let cycles = vec![
            vec![parse("a.a"), parse("b.b")],
            vec![parse("b.b"), parse("a.a")],
        ];
        assert_eq!(deduplicate_cycles(cycles).len(), 1);
    }
}
