//! mvgraph - dependency graphs for materialized-view pipelines.
//!
//! This crate discovers the tables and materialized views of a columnar
//! warehouse, extracts the tables each view reads from, and assembles them
//! into a directed graph that can be analyzed (cycles, depths, impact,
//! influence) and exported for external tooling.
//!
//! # Pipeline
//!
//! ```text
//! CatalogConnection ──► collector ──► analyzer ──► GraphBuilder ──► DependencyGraph
//!   (catalog rows)     (records)     (sources)     (nodes/edges)     (algorithms, export)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mvgraph::catalog::SnapshotCatalog;
//! use mvgraph::config::DiscoveryOptions;
//! use mvgraph::discovery::discover;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let (catalog, _warnings) = SnapshotCatalog::load(Path::new("catalog.jsonl")).await?;
//!     let discovery = discover(&catalog, &DiscoveryOptions::default()).await?;
//!
//!     for cycle in discovery.graph.find_cycles() {
//!         println!("cycle: {cycle:?}");
//!     }
//!     for issue in &discovery.issues {
//!         eprintln!("warning: {issue}");
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod analyzer;
pub mod catalog;
pub mod collector;
pub mod config;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod export;
pub mod graph;

pub use analyzer::{ViewReferences, extract_references};
pub use config::DiscoveryOptions;
pub use discovery::{Discovery, DiscoveryIssue, discover, discover_with_cancellation};
pub use domain::{DiscoveryRecord, ObjectKind, TableRef};
pub use error::{Error, Result};
pub use export::{ExportFormat, write_export};
pub use graph::{
    Depth, DependencyGraph, DependencyKind, GraphBuilder, GraphEdge, GraphNode, HealthReport,
    ImpactReport, LineageDirection,
};
