//! Integration tests for discovery against scripted catalogs.
//!
//! Covers the collector's failure policy: partial failures, fatal connection
//! loss, per-query timeouts, cancellation and the concurrency bound.

use mvgraph::catalog::{CatalogRow, MockCatalog, SourceError};
use mvgraph::{
    DiscoveryIssue, DiscoveryOptions, Error, ObjectKind, TableRef, discover,
    discover_with_cancellation,
};
use rstest::{fixture, rstest};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

/// A three-database pipeline: raw → staging view → analytics view
#[fixture]
fn pipeline() -> MockCatalog {
    MockCatalog::new()
        .with_rows("raw", vec![CatalogRow::table("raw", "events")])
        .with_rows(
            "staging",
            vec![CatalogRow::view("staging", "events_agg", "SELECT * FROM raw.events")],
        )
        .with_rows(
            "analytics",
            vec![CatalogRow::view(
                "analytics",
                "daily_rollup",
                "SELECT * FROM staging.events_agg",
            )],
        )
        .with_database("system")
}

fn table(qualified: &str) -> TableRef {
    qualified.parse().expect("valid table ref")
}

// ============================================================================
// Happy Path
// ============================================================================

#[rstest]
#[tokio::test]
async fn discovers_full_pipeline(pipeline: MockCatalog) {
    let discovery = discover(&pipeline, &DiscoveryOptions::default())
        .await
        .unwrap();

    assert!(discovery.is_complete(), "issues: {:?}", discovery.issues);
    assert_eq!(discovery.graph.node_count(), 3);
    assert_eq!(discovery.graph.edge_count(), 2);
    assert!(!pipeline.queried_databases().contains(&"system".to_string()));
}

#[rstest]
#[tokio::test]
async fn restricting_databases_leaves_placeholders(pipeline: MockCatalog) {
    let options = DiscoveryOptions::for_databases(["staging"]);

    let discovery = discover(&pipeline, &options).await.unwrap();

    let raw = discovery.graph.node(&table("raw.events")).unwrap();
    assert_eq!(raw.kind(), ObjectKind::Unknown);
    assert_eq!(pipeline.queried_databases(), vec!["staging"]);
}

// ============================================================================
// Failure Policy
// ============================================================================

#[tokio::test]
async fn permission_failure_skips_one_database() {
    let catalog = MockCatalog::new()
        .with_rows("raw", vec![CatalogRow::table("raw", "events")])
        .with_failure("secret", SourceError::PermissionDenied("no grant".into()));

    let discovery = discover(&catalog, &DiscoveryOptions::default())
        .await
        .unwrap();

    assert_eq!(discovery.graph.node_count(), 1);
    assert_eq!(
        discovery.issues,
        vec![DiscoveryIssue::DatabaseSkipped {
            database: "secret".into(),
            reason: "permission denied: no grant".into(),
        }]
    );
}

#[tokio::test]
async fn query_failure_skips_one_database() {
    let catalog = MockCatalog::new()
        .with_rows("raw", vec![CatalogRow::table("raw", "events")])
        .with_failure("broken", SourceError::Query("syntax".into()));

    let discovery = discover(&catalog, &DiscoveryOptions::default())
        .await
        .unwrap();

    assert_eq!(discovery.graph.node_count(), 1);
    assert!(matches!(
        discovery.issues.as_slice(),
        [DiscoveryIssue::DatabaseSkipped { database, .. }] if database == "broken"
    ));
}

#[tokio::test]
async fn listing_failure_is_fatal() {
    let catalog = MockCatalog::new().with_list_failure(SourceError::Connection("refused".into()));

    let result = discover(&catalog, &DiscoveryOptions::default()).await;

    assert!(matches!(result, Err(Error::Connection(_))));
}

#[tokio::test]
async fn connection_loss_mid_discovery_is_fatal() {
    let catalog = MockCatalog::new()
        .with_rows("raw", vec![CatalogRow::table("raw", "events")])
        .with_failure("staging", SourceError::Connection("reset by peer".into()));

    let result = discover(&catalog, &DiscoveryOptions::default()).await;

    assert!(matches!(result, Err(Error::Connection(msg)) if msg.contains("reset by peer")));
}

#[tokio::test]
async fn unparseable_view_is_kept_without_sources() {
    let catalog = MockCatalog::new().with_rows(
        "staging",
        vec![CatalogRow::view("staging", "constant", "SELECT 1 AS one")],
    );

    let discovery = discover(&catalog, &DiscoveryOptions::default())
        .await
        .unwrap();

    assert_eq!(discovery.graph.node_count(), 1);
    assert!(matches!(
        discovery.issues.as_slice(),
        [DiscoveryIssue::UnparseableView { .. }]
    ));
}

// ============================================================================
// Timeouts, Cancellation and Concurrency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn slow_database_times_out_and_is_skipped() {
    let catalog = MockCatalog::new()
        .with_rows("raw", vec![CatalogRow::table("raw", "events")])
        .with_delay("slow", Duration::from_secs(120));
    let options = DiscoveryOptions {
        query_timeout: Duration::from_secs(5),
        ..DiscoveryOptions::default()
    };

    let discovery = discover(&catalog, &options).await.unwrap();

    assert_eq!(discovery.graph.node_count(), 1);
    assert!(matches!(
        discovery.issues.as_slice(),
        [DiscoveryIssue::DatabaseSkipped { database, reason }]
            if database == "slow" && reason.contains("timed out")
    ));
}

#[rstest]
#[tokio::test]
async fn cancelled_before_start_returns_empty_graph(pipeline: MockCatalog) {
    let token = CancellationToken::new();
    token.cancel();

    let discovery = discover_with_cancellation(&pipeline, &DiscoveryOptions::default(), &token)
        .await
        .unwrap();

    assert!(discovery.graph.is_empty());
    assert!(discovery.was_cancelled());
    assert!(pipeline.queried_databases().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_partial_results() {
    let catalog = MockCatalog::new()
        .with_rows("a", vec![CatalogRow::table("a", "fast")])
        .with_rows("b", vec![CatalogRow::table("b", "slow")])
        .with_delay("b", Duration::from_secs(10))
        .with_rows("c", vec![CatalogRow::table("c", "never")]);
    let options = DiscoveryOptions {
        concurrency_limit: 1,
        ..DiscoveryOptions::default()
    };
    let token = CancellationToken::new();

    let canceller = async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    };
    let (discovery, ()) = tokio::join!(
        discover_with_cancellation(&catalog, &options, &token),
        canceller
    );
    let discovery = discovery.unwrap();

    assert!(discovery.graph.contains(&table("a.fast")));
    assert!(!discovery.graph.contains(&table("b.slow")));
    assert!(discovery.issues.contains(&DiscoveryIssue::Cancelled {
        pending_databases: vec!["b".into(), "c".into()],
    }));
    assert_eq!(catalog.queried_databases(), vec!["a", "b"]);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(4)]
#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_limit(#[case] limit: usize) {
    let mut catalog = MockCatalog::new();
    for i in 0..8 {
        let db = format!("db{i}");
        catalog = catalog
            .with_rows(&db, vec![CatalogRow::table(db.as_str(), "t")])
            .with_delay(&db, Duration::from_millis(100));
    }
    let options = DiscoveryOptions {
        concurrency_limit: limit,
        ..DiscoveryOptions::default()
    };

    let discovery = discover(&catalog, &options).await.unwrap();

    assert_eq!(discovery.graph.node_count(), 8);
    assert_eq!(catalog.max_in_flight(), limit);
}
