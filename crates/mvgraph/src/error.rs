//! Error types for mvgraph operations.
//!
//! Only infrastructure failures are errors. Problems local to one database or
//! one view are recovered during discovery and reported as
//! [`DiscoveryIssue`](crate::discovery::DiscoveryIssue) values instead.

use std::io;
use thiserror::Error;

/// The error type for mvgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The warehouse could not be reached at all; discovery is aborted.
    #[error("Connection error: {0}")]
    Connection(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A table reference could not be parsed from text.
    #[error("Invalid table reference '{0}': expected database.name")]
    InvalidTableRef(String),

    /// Requested export format is not supported.
    #[error("Unsupported export format '{0}'. Supported formats: json, node-link, dot, graphml")]
    UnsupportedFormat(String),
}

/// A specialized Result type for mvgraph operations.
pub type Result<T> = std::result::Result<T, Error>;
