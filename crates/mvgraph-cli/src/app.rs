//! Application context for CLI command execution.
//!
//! [`App`] resolves configuration, opens the catalog named by the command
//! line and runs one discovery pass. Commands then query the resulting graph.
//!
//! Configuration precedence, highest first:
//!
//! 1. command-line flags
//! 2. the file named by `--config`, else `$MVGRAPH_CONFIG`, else
//!    `./mvgraph.yaml` when it exists
//! 3. built-in defaults

use crate::cli::SourceArgs;
use anyhow::{Context, Result};
use mvgraph::catalog::{CatalogConnection, SnapshotCatalog};
use mvgraph::collector::{RowCollection, collect_rows};
use mvgraph::config::{CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE, MvgraphConfig};
use mvgraph::{Discovery, DiscoveryIssue, DiscoveryOptions, discover_with_cancellation};
use mvgraph_clickhouse::ClickHouseCatalog;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Discovery result plus the settings that produced it.
#[derive(Debug)]
pub struct App {
    discovery: Discovery,
    options: DiscoveryOptions,
}

impl App {
    /// Resolve configuration, open the catalog and discover the graph.
    ///
    /// Ctrl-C cancels discovery; whatever was collected so far is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or snapshot cannot be read, or
    /// if the warehouse is unreachable.
    pub async fn discover(args: &SourceArgs) -> Result<Self> {
        let config = resolve_config(args).await?;
        let options = config.discovery_options();
        let (catalog, mut issues) = open_catalog(args, &config).await?;

        let cancel = cancel_on_interrupt();
        let discovery = discover_with_cancellation(catalog.as_ref(), &options, &cancel)
            .await
            .context("Discovery failed")?;

        issues.extend(discovery.issues);
        Ok(Self {
            discovery: Discovery {
                graph: discovery.graph,
                issues,
            },
            options,
        })
    }

    /// Build an App around an existing discovery result.
    pub fn from_discovery(discovery: Discovery, options: DiscoveryOptions) -> Self {
        Self { discovery, options }
    }

    /// The discovered graph.
    pub fn graph(&self) -> &mvgraph::DependencyGraph {
        &self.discovery.graph
    }

    /// Issues met while loading and discovering.
    pub fn issues(&self) -> &[DiscoveryIssue] {
        &self.discovery.issues
    }

    /// Options discovery ran with.
    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }
}

/// Gather raw catalog rows for a snapshot.
///
/// # Errors
///
/// Same as [`App::discover`].
pub async fn capture(args: &SourceArgs) -> Result<RowCollection> {
    let config = resolve_config(args).await?;
    let options = config.discovery_options();
    let (catalog, mut issues) = open_catalog(args, &config).await?;

    let cancel = cancel_on_interrupt();
    let mut collection = collect_rows(catalog.as_ref(), &options, &cancel)
        .await
        .context("Catalog capture failed")?;

    issues.append(&mut collection.issues);
    collection.issues = issues;
    Ok(collection)
}

/// Load the config file (if any) and apply command-line overrides.
///
/// # Errors
///
/// Returns an error if a named config file cannot be read or parsed, or if
/// the merged configuration is invalid.
pub async fn resolve_config(args: &SourceArgs) -> Result<MvgraphConfig> {
    let cwd = std::env::current_dir()?;
    let path = config_path(args.config.as_deref(), std::env::var(CONFIG_ENV_VAR).ok(), &cwd);

    let mut config = match &path {
        Some(path) => MvgraphConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MvgraphConfig::default(),
    };
    if let Some(path) = &path {
        tracing::debug!(path = %path.display(), "Loaded configuration");
    }

    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

/// Pick the config file: explicit path, then environment, then
/// `mvgraph.yaml` in `cwd` if it exists.
pub fn config_path(explicit: Option<&Path>, env_value: Option<String>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
        return Some(PathBuf::from(value));
    }
    let default = cwd.join(DEFAULT_CONFIG_FILE);
    default.is_file().then_some(default)
}

/// Overwrite config values with the flags that were given.
pub fn apply_overrides(config: &mut MvgraphConfig, args: &SourceArgs) {
    if let Some(url) = &args.url {
        config.clickhouse.url.clone_from(url);
    }
    if let Some(user) = &args.user {
        config.clickhouse.user.clone_from(user);
    }
    if !args.databases.is_empty() {
        config.discovery.databases.clone_from(&args.databases);
    }
    if args.include_system {
        config.discovery.include_system = true;
    }
    if args.include_temp {
        config.discovery.include_temp = true;
    }
    if let Some(limit) = args.concurrency {
        config.discovery.concurrency_limit = limit;
    }
    if let Some(secs) = args.timeout_secs {
        config.discovery.query_timeout_secs = secs;
    }
}

/// Open the snapshot or ClickHouse catalog.
///
/// Snapshot warnings come back as issues so they are reported with the
/// discovery issues.
async fn open_catalog(
    args: &SourceArgs,
    config: &MvgraphConfig,
) -> Result<(Box<dyn CatalogConnection>, Vec<DiscoveryIssue>)> {
    if let Some(path) = &args.snapshot {
        let (catalog, warnings) = SnapshotCatalog::load(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let issues = warnings.into_iter().map(DiscoveryIssue::from).collect();
        return Ok((Box::new(catalog), issues));
    }

    tracing::info!(url = %config.clickhouse.url, "Connecting to ClickHouse");
    Ok((
        Box::new(ClickHouseCatalog::from_config(&config.clickhouse)),
        Vec::new(),
    ))
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    tracing::warn!("Interrupted, keeping partial results");
                    token.cancel();
                }
            }
            () = token.cancelled() => {}
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvgraph::catalog::{CatalogRow, snapshot::write_snapshot};
    use tempfile::TempDir;

    #[test]
    fn explicit_config_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "{}").unwrap();

        let path = config_path(
            Some(Path::new("/etc/mvgraph.yaml")),
            Some("/from/env.yaml".to_string()),
            dir.path(),
        );

        assert_eq!(path, Some(PathBuf::from("/etc/mvgraph.yaml")));
    }

    #[test]
    fn environment_beats_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "{}").unwrap();

        let path = config_path(None, Some("/from/env.yaml".to_string()), dir.path());

        assert_eq!(path, Some(PathBuf::from("/from/env.yaml")));
    }

    #[test]
    fn working_directory_file_is_optional() {
        let dir = TempDir::new().unwrap();
        assert_eq!(config_path(None, None, dir.path()), None);

        std::fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "{}").unwrap();
        assert_eq!(
            config_path(None, Some(String::new()), dir.path()),
            Some(dir.path().join(DEFAULT_CONFIG_FILE))
        );
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = MvgraphConfig::from_yaml(
            "clickhouse:\n  url: http://file:8123\n  user: file\n\
             discovery:\n  databases: [a]\n  concurrency-limit: 2\n",
        )
        .unwrap();
        let args = SourceArgs {
            url: Some("http://flag:8123".into()),
            databases: vec!["b".into(), "c".into()],
            include_temp: true,
            timeout_secs: Some(9),
            ..SourceArgs::default()
        };

        apply_overrides(&mut config, &args);

        assert_eq!(config.clickhouse.url, "http://flag:8123");
        assert_eq!(config.clickhouse.user, "file");
        assert_eq!(config.discovery.databases, vec!["b", "c"]);
        assert_eq!(config.discovery.concurrency_limit, 2);
        assert!(config.discovery.include_temp);
        assert_eq!(config.discovery.query_timeout_secs, 9);
    }

    #[tokio::test]
    async fn discovers_from_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = dir.path().join("catalog.jsonl");
        let config = dir.path().join("empty.yaml");
        std::fs::write(&config, "{}").unwrap();
        write_snapshot(
            &snapshot,
            &[
                CatalogRow::table("raw", "events"),
                CatalogRow::view("staging", "agg", "SELECT * FROM raw.events"),
            ],
        )
        .await
        .unwrap();

        let app = App::discover(&SourceArgs {
            config: Some(config),
            snapshot: Some(snapshot),
            ..SourceArgs::default()
        })
        .await
        .unwrap();

        assert_eq!(app.graph().edge_count(), 1);
        assert!(app.issues().is_empty());
    }
}
