//! Configuration for discovery runs.
//!
//! [`DiscoveryOptions`] controls one discovery pass. [`MvgraphConfig`] is the
//! on-disk YAML file used by the CLI; it carries connection settings and a
//! `discovery` section with the same fields as `DiscoveryOptions`.
//!
//! ```yaml
//! clickhouse:
//!   url: http://localhost:8123
//!   user: default
//! discovery:
//!   databases: [raw, staging, analytics]
//!   include-temp: false
//!   concurrency-limit: 4
//!   query-timeout-secs: 30
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Default number of per-database catalog queries in flight
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Default per-database query timeout in seconds
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MVGRAPH_CONFIG";

/// Config file looked up in the working directory when none is named
pub const DEFAULT_CONFIG_FILE: &str = "mvgraph.yaml";

/// Options for a single discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Databases to scan; empty means every non-system database
    pub databases: Vec<String>,

    /// Include system databases when `databases` is empty
    pub include_system: bool,

    /// Keep temporary tables in the result
    pub include_temp: bool,

    /// Maximum concurrent per-database queries (values below 1 act as 1)
    pub concurrency_limit: usize,

    /// Timeout applied to each per-database catalog query
    pub query_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            include_system: false,
            include_temp: false,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }
}

impl DiscoveryOptions {
    /// Options scanning the given databases with default settings.
    pub fn for_databases<I, S>(databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            databases: databases.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Concurrency limit clamped to at least one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.max(1)
    }
}

/// Configuration file structure for mvgraph
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct MvgraphConfig {
    /// Warehouse connection settings
    #[serde(default)]
    pub clickhouse: ConnectionConfig,

    /// Discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Connection section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionConfig {
    /// HTTP endpoint of the warehouse
    pub url: String,

    /// User name
    pub user: String,

    /// Password (prefer the `CLICKHOUSE_PASSWORD` environment variable)
    #[serde(default)]
    pub password: Option<String>,

    /// Database used for the session
    #[serde(default)]
    pub database: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            user: "default".to_string(),
            password: None,
            database: None,
        }
    }
}

/// Discovery section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Databases to scan; empty means all non-system databases
    #[serde(default)]
    pub databases: Vec<String>,

    /// Include system databases
    #[serde(default)]
    pub include_system: bool,

    /// Include temporary tables
    #[serde(default)]
    pub include_temp: bool,

    /// Maximum concurrent per-database queries
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Per-database query timeout in seconds
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            databases: Vec::new(),
            include_system: false,
            include_temp: false,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

impl From<&DiscoveryConfig> for DiscoveryOptions {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            databases: config.databases.clone(),
            include_system: config.include_system,
            include_temp: config.include_temp,
            concurrency_limit: config.concurrency_limit,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }
}

impl MvgraphConfig {
    /// Parse configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the YAML is invalid or a value is out of range.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read, `Error::Config` if it
    /// does not parse.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        Self::from_yaml(&content)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on serialization failure and `Error::Io` on write failure.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Reject values that cannot drive a discovery pass.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.clickhouse.url.trim().is_empty() {
            return Err(Error::Config("clickhouse.url must not be empty".to_string()));
        }
        if self.discovery.concurrency_limit == 0 {
            return Err(Error::Config(
                "discovery.concurrency-limit must be at least 1".to_string(),
            ));
        }
        if self.discovery.query_timeout_secs == 0 {
            return Err(Error::Config(
                "discovery.query-timeout-secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Discovery options described by this file.
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions::from(&self.discovery)
    }
}
