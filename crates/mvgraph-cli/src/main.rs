//! mvgraph CLI binary.

use anyhow::Result;
use mvgraph_cli::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the mvgraph CLI.
///
/// Catalog queries are I/O-bound, so a current-thread runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so `--json` output on stdout stays machine-readable.
    // Example: RUST_LOG=mvgraph=debug,mvgraph_clickhouse=debug mvgraph discover
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mvgraph=info,mvgraph_clickhouse=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting mvgraph CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("mvgraph CLI completed successfully");
    Ok(())
}
