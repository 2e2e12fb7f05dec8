//! Influence scoring.

use super::DependencyGraph;
use crate::domain::TableRef;
use std::collections::BTreeMap;

/// Weight of each incoming edge; outgoing edges weigh 1.
const INCOMING_WEIGHT: usize = 2;

impl DependencyGraph {
    /// Influence score of one table: `incoming * 2 + outgoing`.
    ///
    /// Parallel edges count individually. Tables without a node score 0.
    pub fn influence_score(&self, table: &TableRef) -> usize {
        self.in_degree(table) * INCOMING_WEIGHT + self.out_degree(table)
    }

    /// Influence score of every node.
    pub fn influence_scores(&self) -> BTreeMap<TableRef, usize> {
        self.nodes()
            .into_iter()
            .map(|node| (node.table.clone(), self.influence_score(&node.table)))
            .collect()
    }

    /// The `limit` highest-scoring tables, ties broken by `TableRef`.
    pub fn most_influential(&self, limit: usize) -> Vec<(TableRef, usize)> {
        let mut ranked: Vec<(TableRef, usize)> = self.influence_scores().into_iter().collect();
        ranked.sort_by(|(a_ref, a_score), (b_ref, b_score)| {
            b_score.cmp(a_score).then_with(|| a_ref.cmp(b_ref))
        });
        ranked.truncate(limit);
        ranked
    }
}
