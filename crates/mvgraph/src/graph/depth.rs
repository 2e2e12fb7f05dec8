//! Longest-path depth from the roots of the graph.

use super::DependencyGraph;
use crate::domain::TableRef;
use petgraph::Direction;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

/// Depth of a node: longest path length from any root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Depth {
    /// Number of edges on the longest path from a root
    Level(usize),

    /// Not computable: the node is on a cycle or fed by one
    Undefined,
}

impl Depth {
    /// The numeric depth, if defined
    pub fn level(self) -> Option<usize> {
        match self {
            Self::Level(level) => Some(level),
            Self::Undefined => None,
        }
    }

    /// True for [`Depth::Undefined`]
    pub fn is_undefined(self) -> bool {
        self == Self::Undefined
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(level) => write!(f, "{level}"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

impl Serialize for Depth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Level(level) => serializer.serialize_u64(*level as u64),
            Self::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

impl DependencyGraph {
    /// Depth of every node.
    ///
    /// Roots (no incoming edges) are at 0; every other node is one more than
    /// its deepest predecessor. Topological processing never reaches nodes on
    /// a cycle or downstream of one, and those are reported as
    /// [`Depth::Undefined`].
    pub fn calculate_depths(&self) -> BTreeMap<TableRef, Depth> {
        let graph = self.inner();
        let mut remaining: HashMap<_, usize> = graph
            .node_indices()
            .map(|idx| (idx, self.neighbors(idx, Direction::Incoming).len()))
            .collect();
        let mut levels = HashMap::new();
        let mut queue: VecDeque<_> = self
            .sorted_indices()
            .into_iter()
            .filter(|idx| remaining.get(idx) == Some(&0))
            .collect();

        for &root in &queue {
            levels.insert(root, 0usize);
        }

        while let Some(idx) = queue.pop_front() {
            let level = levels.get(&idx).copied().unwrap_or(0);
            for next in self.successors(idx) {
                let entry = levels.entry(next).or_insert(0);
                *entry = (*entry).max(level + 1);
                if let Some(count) = remaining.get_mut(&next) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        graph
            .node_indices()
            .map(|idx| {
                let depth = if remaining.get(&idx) == Some(&0) {
                    Depth::Level(levels.get(&idx).copied().unwrap_or(0))
                } else {
                    Depth::Undefined
                };
                (self.table_at(idx).clone(), depth)
            })
            .collect()
    }

    /// Depth of one node; `None` when the table has no node.
    pub fn depth_of(&self, table: &TableRef) -> Option<Depth> {
        self.contains(table)
            .then(|| self.calculate_depths().remove(table))
            .flatten()
    }

    /// Largest numeric depth, ignoring undefined ones.
    pub fn max_depth(&self) -> Option<usize> {
        self.calculate_depths()
            .values()
            .filter_map(|depth| depth.level())
            .max()
    }
}
