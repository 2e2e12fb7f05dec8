//! Command-line explorer for materialized-view dependency graphs.
//!
//! The binary is a thin layer over the `mvgraph` library: it resolves
//! configuration, opens a catalog (live ClickHouse or a snapshot file), runs
//! discovery once and renders the requested analysis as text or JSON.

#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod output;
