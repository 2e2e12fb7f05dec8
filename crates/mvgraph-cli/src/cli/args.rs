//! CLI argument structs for all commands.

use clap::{Args, Parser};
use mvgraph::{ExportFormat, LineageDirection, TableRef};
use std::path::PathBuf;

use super::validators::{validate_database, validate_positive, validate_table_ref};

/// Where the catalog comes from and how discovery runs.
///
/// Every flag overrides the matching value of the configuration file.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceArgs {
    /// Configuration file
    ///
    /// Defaults to `$MVGRAPH_CONFIG`, then `./mvgraph.yaml` when present.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Read the catalog from a JSON Lines snapshot instead of ClickHouse
    #[arg(long, global = true, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// ClickHouse HTTP endpoint (e.g. http://localhost:8123)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// ClickHouse user
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Databases to scan (comma-separated, repeatable)
    ///
    /// When omitted, every non-system database is scanned.
    #[arg(short = 'd', long = "database", global = true, value_delimiter = ',', value_parser = validate_database)]
    pub databases: Vec<String>,

    /// Scan system databases too
    #[arg(long, global = true)]
    pub include_system: bool,

    /// Keep temporary tables in the graph
    #[arg(long, global = true)]
    pub include_temp: bool,

    /// Maximum concurrent catalog queries
    #[arg(long, global = true, value_parser = validate_positive)]
    pub concurrency: Option<usize>,

    /// Per-database query timeout in seconds
    #[arg(long = "timeout", global = true, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,
}

/// Arguments for the `discover` command
#[derive(Parser, Debug, Clone)]
pub struct DiscoverArgs {
    /// List every node with its kind
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for commands that take one table
#[derive(Parser, Debug, Clone)]
pub struct TableArgs {
    /// Table as database.name
    #[arg(value_parser = validate_table_ref)]
    pub table: TableRef,
}

/// Arguments for the `lineage` command
#[derive(Parser, Debug, Clone)]
pub struct LineageArgs {
    /// Table as database.name
    #[arg(value_parser = validate_table_ref)]
    pub table: TableRef,

    /// Direction to trace: upstream, downstream or both
    #[arg(long, default_value = "both")]
    pub direction: LineageDirection,
}

/// Arguments for the `path` command
#[derive(Parser, Debug, Clone)]
pub struct PathArgs {
    /// Start table as database.name
    #[arg(value_parser = validate_table_ref)]
    pub from: TableRef,

    /// End table as database.name
    #[arg(value_parser = validate_table_ref)]
    pub to: TableRef,
}

/// Arguments for the `top` command
#[derive(Parser, Debug, Clone)]
pub struct TopArgs {
    /// Number of tables to show
    #[arg(short = 'n', long, default_value = "10", value_parser = validate_positive)]
    pub limit: usize,
}

/// Arguments for the `export` command
#[derive(Parser, Debug, Clone)]
pub struct ExportArgs {
    /// Output format: json, node-link, dot or graphml
    #[arg(short, long, default_value = "json")]
    pub format: ExportFormat,

    /// Output file; prints to stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `snapshot` command
#[derive(Parser, Debug, Clone)]
pub struct SnapshotArgs {
    /// Snapshot file to write (JSON Lines)
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}
