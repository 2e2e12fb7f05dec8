//! Reachability: impact sets, lineage and shortest dependency paths.

use super::DependencyGraph;
use crate::domain::TableRef;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::str::FromStr;

/// Result of [`DependencyGraph::analyze_impact`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    /// Everything reachable through outgoing edges
    pub downstream: BTreeSet<TableRef>,

    /// The materialized views among `downstream`
    pub affected_views: BTreeSet<TableRef>,
}

impl ImpactReport {
    /// True if nothing is affected
    pub fn is_empty(&self) -> bool {
        self.downstream.is_empty()
    }
}

/// Which way to trace lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineageDirection {
    /// Tables the given table is derived from
    Upstream,
    /// Tables derived from the given table
    Downstream,
    /// Both directions
    #[default]
    Both,
}

impl FromStr for LineageDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upstream" | "up" => Ok(Self::Upstream),
            "downstream" | "down" => Ok(Self::Downstream),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown direction '{other}' (expected upstream, downstream or both)"
            )),
        }
    }
}

/// Transitive lineage of one table.
///
/// A direction that was not requested is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lineage {
    /// Transitive sources
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<BTreeSet<TableRef>>,

    /// Transitive dependents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downstream: Option<BTreeSet<TableRef>>,
}

impl DependencyGraph {
    /// Everything affected by a change to `table`.
    ///
    /// The start node is only part of `downstream` when a cycle leads back to
    /// it. A table without a node yields an empty report.
    pub fn analyze_impact(&self, table: &TableRef) -> ImpactReport {
        let downstream = self.reachable(table, Direction::Outgoing);
        let affected_views = downstream
            .iter()
            .filter(|t| self.node(t).is_some_and(|node| node.is_view()))
            .cloned()
            .collect();

        ImpactReport {
            downstream,
            affected_views,
        }
    }

    /// Transitive upstream and/or downstream sets of `table`.
    pub fn lineage(&self, table: &TableRef, direction: LineageDirection) -> Lineage {
        let upstream = matches!(direction, LineageDirection::Upstream | LineageDirection::Both)
            .then(|| self.reachable(table, Direction::Incoming));
        let downstream = matches!(direction, LineageDirection::Downstream | LineageDirection::Both)
            .then(|| self.reachable(table, Direction::Outgoing));

        Lineage {
            upstream,
            downstream,
        }
    }

    /// Shortest dependency chain from `from` to `to`, both ends included.
    ///
    /// `None` when either table is missing or `to` is not downstream of `from`.
    pub fn shortest_path(&self, from: &TableRef, to: &TableRef) -> Option<Vec<TableRef>> {
        let start = self.index_of(from)?;
        let goal = self.index_of(to)?;

        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == goal {
                let mut path = vec![self.table_at(current).clone()];
                let mut cursor = current;
                while let Some(&parent) = parents.get(&cursor) {
                    path.push(self.table_at(parent).clone());
                    cursor = parent;
                }
                path.reverse();
                return Some(path);
            }

            for next in self.successors(current) {
                if visited.insert(next) {
                    parents.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    /// BFS over one edge direction, excluding the start unless revisited.
    fn reachable(&self, table: &TableRef, direction: Direction) -> BTreeSet<TableRef> {
        let Some(start) = self.index_of(table) else {
            return BTreeSet::new();
        };

        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current, direction) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        seen.into_iter()
            .map(|idx| self.table_at(idx).clone())
            .collect()
    }
}
