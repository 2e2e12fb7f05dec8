//! Pipeline health summary and per-database statistics.

use super::{DependencyGraph, Depth};
use crate::domain::{ObjectKind, TableRef};
use serde::Serialize;
use std::collections::BTreeMap;

/// More orphans than this triggers a cleanup recommendation.
const ORPHAN_THRESHOLD: usize = 10;

/// Depths above this trigger a simplification recommendation.
const DEPTH_THRESHOLD: usize = 5;

/// How many of the most connected tables to report.
const MOST_CONNECTED: usize = 5;

/// Summary of structural risks in the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Tables and temporary tables
    pub total_tables: usize,

    /// Materialized views
    pub total_views: usize,

    /// Referenced but undiscovered tables
    pub total_placeholders: usize,

    /// Edges
    pub total_dependencies: usize,

    /// Distinct cycles
    pub cycles: Vec<Vec<TableRef>>,

    /// Tables with no dependency at all
    pub orphaned_tables: Vec<TableRef>,

    /// Largest numeric depth
    pub max_depth: Option<usize>,

    /// Node count per depth
    pub depth_distribution: BTreeMap<Depth, usize>,

    /// Tables with the most edges (in + out)
    pub most_connected: Vec<(TableRef, usize)>,

    /// Mean edge endpoints per node
    pub avg_connections: f64,

    /// Human-readable findings
    pub recommendations: Vec<String>,
}

impl HealthReport {
    /// True when no recommendation was raised
    pub fn is_healthy(&self) -> bool {
        self.cycles.is_empty()
            && self.orphaned_tables.len() <= ORPHAN_THRESHOLD
            && self.max_depth.is_none_or(|depth| depth <= DEPTH_THRESHOLD)
            && self.total_views <= self.total_tables * 2
    }
}

/// Object counts and sizes for one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    /// Ordinary tables
    pub tables: usize,
    /// Materialized views
    pub views: usize,
    /// Temporary tables
    pub temporary: usize,
    /// Placeholder nodes
    pub placeholders: usize,
    /// Sum of row counts
    pub rows: u64,
    /// Sum of on-disk sizes
    pub bytes: u64,
}

impl DependencyGraph {
    /// Summarize cycles, orphans, depth and connectivity.
    pub fn health_report(&self) -> HealthReport {
        let nodes = self.nodes();
        let count = |kinds: &[ObjectKind]| nodes.iter().filter(|n| kinds.contains(&n.kind())).count();
        let total_tables = count(&[ObjectKind::Table, ObjectKind::Temporary]);
        let total_views = count(&[ObjectKind::MaterializedView]);
        let total_placeholders = count(&[ObjectKind::Unknown]);

        let cycles = self.find_cycles();
        let orphaned_tables: Vec<TableRef> = self
            .orphaned_tables()
            .into_iter()
            .map(|node| node.table.clone())
            .collect();

        let depths = self.calculate_depths();
        let max_depth = depths.values().filter_map(|d| d.level()).max();
        let mut depth_distribution = BTreeMap::new();
        for depth in depths.values() {
            *depth_distribution.entry(*depth).or_insert(0) += 1;
        }

        let mut connections: Vec<(TableRef, usize)> = nodes
            .iter()
            .map(|n| (n.table.clone(), self.in_degree(&n.table) + self.out_degree(&n.table)))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let avg_connections = if connections.is_empty() {
            0.0
        } else {
            connections.iter().map(|(_, c)| *c).sum::<usize>() as f64 / connections.len() as f64
        };
        connections.sort_by(|(a_ref, a), (b_ref, b)| b.cmp(a).then_with(|| a_ref.cmp(b_ref)));
        connections.truncate(MOST_CONNECTED);

        let mut recommendations = Vec::new();
        if !cycles.is_empty() {
            recommendations.push(format!(
                "Found {} dependency cycle(s); inserts may loop between views",
                cycles.len()
            ));
        }
        if orphaned_tables.len() > ORPHAN_THRESHOLD {
            recommendations.push(format!(
                "{} orphaned tables; consider cleanup or documentation",
                orphaned_tables.len()
            ));
        }
        if let Some(depth) = max_depth.filter(|d| *d > DEPTH_THRESHOLD) {
            recommendations.push(format!(
                "Maximum dependency depth is {depth}; consider simplifying pipelines"
            ));
        }
        if total_views > total_tables * 2 {
            recommendations.push(format!(
                "High view to table ratio ({total_views}/{total_tables}); inserts fan out widely"
            ));
        }

        HealthReport {
            total_tables,
            total_views,
            total_placeholders,
            total_dependencies: self.edge_count(),
            cycles,
            orphaned_tables,
            max_depth,
            depth_distribution,
            most_connected: connections,
            avg_connections,
            recommendations,
        }
    }

    /// Per-database object counts and sizes.
    pub fn database_stats(&self) -> BTreeMap<String, DatabaseStats> {
        let mut stats: BTreeMap<String, DatabaseStats> = BTreeMap::new();
        for node in self.nodes() {
            let entry = stats.entry(node.table.database.clone()).or_default();
            match node.kind() {
                ObjectKind::Table => entry.tables += 1,
                ObjectKind::MaterializedView => entry.views += 1,
                ObjectKind::Temporary => entry.temporary += 1,
                ObjectKind::Unknown => entry.placeholders += 1,
            }
            entry.rows += node.record.row_count;
            entry.bytes += node.record.size_bytes;
        }
        stats
    }
}
