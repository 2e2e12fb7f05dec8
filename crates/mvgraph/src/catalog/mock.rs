//! Scripted catalog connection for tests.

use super::{CatalogConnection, CatalogRow, SourceError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory [`CatalogConnection`] with scripted rows, failures and latency.
///
/// Also records which databases were queried and the highest number of
/// concurrent `list_objects` calls, so tests can assert on the collector's
/// scheduling.
///
/// ```rust,ignore
/// let catalog = MockCatalog::new()
///     .with_rows("raw", vec![CatalogRow::table("raw", "events")])
///     .with_failure("secret", SourceError::PermissionDenied("no grant".into()));
/// ```
#[derive(Debug, Default)]
pub struct MockCatalog {
    rows: BTreeMap<String, Vec<CatalogRow>>,
    failures: HashMap<String, SourceError>,
    delays: HashMap<String, Duration>,
    list_failure: Option<SourceError>,
    extra_databases: Vec<String>,
    queried: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCatalog {
    /// Create an empty mock catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows for a database (appends to any existing rows).
    #[must_use]
    pub fn with_rows(mut self, database: &str, rows: Vec<CatalogRow>) -> Self {
        self.rows.entry(database.to_string()).or_default().extend(rows);
        self
    }

    /// Make `list_objects` fail for a database.
    #[must_use]
    pub fn with_failure(mut self, database: &str, error: SourceError) -> Self {
        self.rows.entry(database.to_string()).or_default();
        self.failures.insert(database.to_string(), error);
        self
    }

    /// Delay `list_objects` for a database.
    #[must_use]
    pub fn with_delay(mut self, database: &str, delay: Duration) -> Self {
        self.rows.entry(database.to_string()).or_default();
        self.delays.insert(database.to_string(), delay);
        self
    }

    /// Make `list_databases` fail.
    #[must_use]
    pub fn with_list_failure(mut self, error: SourceError) -> Self {
        self.list_failure = Some(error);
        self
    }

    /// Report an additional database with no rows (e.g. `system`).
    #[must_use]
    pub fn with_database(mut self, database: &str) -> Self {
        self.extra_databases.push(database.to_string());
        self
    }

    /// Databases passed to `list_objects`, in call order.
    pub fn queried_databases(&self) -> Vec<String> {
        self.queried
            .lock()
            .map(|queried| queried.clone())
            .unwrap_or_default()
    }

    /// Highest number of `list_objects` calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogConnection for MockCatalog {
    async fn list_databases(&self) -> Result<Vec<String>, SourceError> {
        if let Some(error) = &self.list_failure {
            return Err(error.clone());
        }

        let mut databases: Vec<String> = self
            .rows
            .keys()
            .cloned()
            .chain(self.extra_databases.iter().cloned())
            .collect();
        databases.sort();
        databases.dedup();
        Ok(databases)
    }

    async fn list_objects(&self, database: &str) -> Result<Vec<CatalogRow>, SourceError> {
        if let Ok(mut queried) = self.queried.lock() {
            queried.push(database.to_string());
        }

        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

        if let Some(delay) = self.delays.get(database) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(error) = self.failures.get(database) {
            return Err(error.clone());
        }

        Ok(self.rows.get(database).cloned().unwrap_or_default())
    }
}

/// Tracks one running call; released on drop so timed-out calls are counted out too.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(current, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
