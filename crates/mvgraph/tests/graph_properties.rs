//! Property-based tests for graph invariants.
//!
//! Graphs are generated directly as records plus per-view source sets, so
//! these properties exercise the builder and algorithms without SQL text.

use mvgraph::analyzer::ViewReferences;
use mvgraph::graph::build_graph;
use mvgraph::{Depth, DependencyGraph, DiscoveryRecord, ObjectKind, TableRef};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Generated input: records plus the sources of each view.
#[derive(Debug, Clone)]
struct Catalog {
    records: Vec<DiscoveryRecord>,
    sources: BTreeMap<TableRef, BTreeSet<TableRef>>,
}

impl Catalog {
    fn build(&self) -> DependencyGraph {
        let references = self.sources.iter().map(|(view, sources)| {
            (
                view.clone(),
                ViewReferences {
                    sources: sources.clone(),
                    target: None,
                    warning: None,
                },
            )
        });
        build_graph(self.records.clone(), references).0
    }

    fn views(&self) -> Vec<TableRef> {
        self.sources.keys().cloned().collect()
    }
}

fn name(i: usize) -> TableRef {
    TableRef::new(format!("db{}", i % 3), format!("t{i}"))
}

fn missing(i: usize) -> TableRef {
    TableRef::new("excluded", format!("m{i}"))
}

/// Generates catalogs of up to 12 objects. With `acyclic`, views only read
/// lower-numbered objects, so the graph is a DAG.
fn arb_catalog(acyclic: bool) -> impl Strategy<Value = Catalog> {
    (1usize..12)
        .prop_flat_map(|n| {
            (
                Just(n),
                prop::collection::vec(any::<bool>(), n),
                prop::collection::vec((0..n, 0..n + 3), 0..n * 3),
            )
        })
        .prop_map(move |(n, is_view, links)| {
            let records = (0..n)
                .map(|i| {
                    let kind = if is_view[i] {
                        ObjectKind::MaterializedView
                    } else {
                        ObjectKind::Table
                    };
                    DiscoveryRecord::new(name(i), kind)
                })
                .collect();

            let mut sources: BTreeMap<TableRef, BTreeSet<TableRef>> = (0..n)
                .filter(|&i| is_view[i])
                .map(|i| (name(i), BTreeSet::new()))
                .collect();
            for (view, source) in links {
                if !is_view[view] || (acyclic && source < n && source >= view) {
                    continue;
                }
                let source = if source < n { name(source) } else { missing(source - n) };
                if let Some(set) = sources.get_mut(&name(view)) {
                    set.insert(source);
                }
            }

            Catalog { records, sources }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn one_node_per_distinct_table(catalog in arb_catalog(false)) {
        let graph = catalog.build();

        let mut expected: BTreeSet<TableRef> =
            catalog.records.iter().map(|r| r.table_ref.clone()).collect();
        expected.extend(catalog.sources.values().flatten().cloned());

        prop_assert_eq!(graph.node_count(), expected.len());
        let actual: BTreeSet<TableRef> = graph.nodes().iter().map(|n| n.table.clone()).collect();
        prop_assert_eq!(actual, expected);
        for edge in graph.edges() {
            prop_assert!(graph.contains(&edge.source));
            prop_assert!(graph.contains(&edge.target));
        }
    }

    #[test]
    fn acyclic_depth_is_one_more_than_deepest_predecessor(catalog in arb_catalog(true)) {
        let graph = catalog.build();
        prop_assert!(graph.find_cycles().is_empty());

        let depths = graph.calculate_depths();
        for node in graph.nodes() {
            let preds = graph.incoming(&node.table);
            let expected = preds
                .iter()
                .map(|p| depths[p].level().expect("acyclic depth is defined"))
                .max()
                .map_or(0, |deepest| deepest + 1);
            prop_assert_eq!(depths[&node.table], Depth::Level(expected));
        }
    }

    #[test]
    fn self_loop_is_reported_as_single_node_cycle(
        catalog in arb_catalog(false),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut catalog = catalog;
        let views = catalog.views();
        prop_assume!(!views.is_empty());
        let view = pick.get(&views).clone();
        catalog.sources.entry(view.clone()).or_default().insert(view.clone());

        let cycles = catalog.build().find_cycles();
        prop_assert!(cycles.contains(&vec![view]));
    }

    #[test]
    fn impact_matches_reachability(catalog in arb_catalog(false)) {
        let graph = catalog.build();

        for start in graph.nodes() {
            let impact = graph.analyze_impact(&start.table);
            for other in graph.nodes() {
                if other.table == start.table {
                    continue;
                }
                let reachable = graph.shortest_path(&start.table, &other.table).is_some();
                prop_assert_eq!(impact.downstream.contains(&other.table), reachable);
            }
            for view in &impact.affected_views {
                prop_assert!(impact.downstream.contains(view));
                prop_assert!(graph.node(view).is_some_and(|n| n.is_view()));
            }
        }
    }

    #[test]
    fn new_edge_raises_scores_by_two_and_one(
        catalog in arb_catalog(false),
        view_pick in any::<prop::sample::Index>(),
        source_pick in any::<prop::sample::Index>(),
    ) {
        let views = catalog.views();
        prop_assume!(!views.is_empty());
        let view = view_pick.get(&views).clone();
        let tables: Vec<TableRef> = catalog.records.iter().map(|r| r.table_ref.clone()).collect();
        let source = source_pick.get(&tables).clone();
        prop_assume!(source != view);
        prop_assume!(!catalog.sources[&view].contains(&source));

        let before = catalog.build();
        let mut extended = catalog.clone();
        extended.sources.entry(view.clone()).or_default().insert(source.clone());
        let after = extended.build();

        prop_assert_eq!(after.influence_score(&view), before.influence_score(&view) + 2);
        prop_assert_eq!(after.influence_score(&source), before.influence_score(&source) + 1);
    }

    #[test]
    fn every_export_preserves_counts(catalog in arb_catalog(false)) {
        let graph = catalog.build();
        let (nodes, edges) = (graph.node_count(), graph.edge_count());

        let json = graph.to_json_value().unwrap();
        prop_assert_eq!(json["nodes"].as_array().map(Vec::len), Some(nodes));
        prop_assert_eq!(json["edges"].as_array().map(Vec::len), Some(edges));

        let node_link = graph.to_node_link();
        prop_assert_eq!(node_link.nodes.len(), nodes);
        prop_assert_eq!(node_link.links.len(), edges);

        let dot = graph.to_dot();
        prop_assert_eq!(dot.matches(" -> ").count(), edges);
        prop_assert_eq!(dot.lines().filter(|l| l.contains("fillcolor=")).count(), nodes);

        let graphml = graph.to_graphml();
        prop_assert_eq!(graphml.matches("<node ").count(), nodes);
        prop_assert_eq!(graphml.matches("<edge ").count(), edges);
    }
}
