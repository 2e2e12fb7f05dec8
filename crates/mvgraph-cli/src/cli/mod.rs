//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `discover`: run discovery and summarize the graph
//! - `cycles`: list dependency cycles
//! - `depths`: show each table's pipeline depth
//! - `impact`: everything affected by changing one table
//! - `lineage`: upstream and downstream lineage of one table
//! - `path`: shortest dependency path between two tables
//! - `top`: most influential tables
//! - `health`: structural health report
//! - `stats`: per-database object counts and sizes
//! - `expired`: temporary tables past their TTL marker
//! - `export`: write the graph as JSON, node-link, DOT or GraphML
//! - `snapshot`: capture the raw catalog to a JSON Lines file
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - catalog source and discovery flags, see [`SourceArgs`]
//!
//! # Example
//!
//! ```bash
//! mvgraph --url http://localhost:8123 -d raw,staging,analytics health
//! mvgraph --snapshot catalog.jsonl impact raw.events
//! mvgraph --snapshot catalog.jsonl export --format dot -o graph.dot
//! ```

mod args;
mod execute;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use args::{
    DiscoverArgs, ExportArgs, LineageArgs, PathArgs, SnapshotArgs, SourceArgs, TableArgs, TopArgs,
};
pub use validators::{validate_database, validate_positive, validate_table_ref};

/// mvgraph - dependency graphs for materialized-view pipelines
///
/// Discovers tables and materialized views in ClickHouse, links each view to
/// the tables it reads, and analyzes the resulting graph.
#[derive(Parser, Debug)]
#[command(name = "mvgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Catalog source and discovery settings
    #[command(flatten)]
    pub source: SourceArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Discover the graph and print a summary
    ///
    /// Reports node and edge counts per kind, then every problem met during
    /// discovery (skipped databases, unparseable views, snapshot errors).
    Discover(DiscoverArgs),

    /// List dependency cycles
    Cycles,

    /// Show the depth of every table
    ///
    /// Root tables have depth 0. Tables in or downstream of a cycle have no
    /// defined depth.
    Depths,

    /// Show everything affected by changing a table
    Impact(TableArgs),

    /// Trace a table's lineage
    Lineage(LineageArgs),

    /// Find the shortest dependency path between two tables
    Path(PathArgs),

    /// Rank tables by influence
    ///
    /// A table scores 2 per incoming and 1 per outgoing dependency.
    Top(TopArgs),

    /// Report structural health and recommendations
    Health,

    /// Show per-database statistics
    Stats,

    /// List temporary tables whose TTL marker has passed
    Expired,

    /// Export the graph
    Export(ExportArgs),

    /// Capture the catalog into a snapshot file
    ///
    /// The snapshot can later be analyzed offline with `--snapshot`.
    Snapshot(SnapshotArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or output cannot be written.
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::{OutputConfig, OutputMode};

        let mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };
        let config = OutputConfig::from_env();

        let Some(command) = &self.command else {
            println!("mvgraph - dependency graphs for materialized-view pipelines");
            println!("Use --help for more information");
            return Ok(());
        };

        if let Commands::Snapshot(args) = command {
            return execute::execute_snapshot(&self.source, args, mode).await;
        }

        let app = App::discover(&self.source).await?;
        execute::run(&app, command, mode, config).await
    }
}
