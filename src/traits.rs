//! Host-facing extension traits and their registries.
//!
//! The host discovers this crate's functionality through two seams:
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────┐
//! │      DataSourceRegistry      │   │       JobRegistry        │
//! │  one DataSource per remote   │   │  OverviewPoller          │
//! │  collection (news2023, ...)  │   │  (webjutter-updater)     │
//! └──────────────┬───────────────┘   └────────────┬─────────────┘
//!                ▼                                ▼
//!      dataset creation flow             host scheduler, fixed interval
//! ```
//!
//! Both registries are filled once at start-up and are read-only afterwards.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::models::{SearchOutcome, SearchRequest};
use crate::progress::SearchProgressReporter;

// ═══════════════════════════════════════════════════════════════════════
// DataSource Trait
// ═══════════════════════════════════════════════════════════════════════

/// A searchable data source as the host sees it.
///
/// # Lifecycle
///
/// 1. Registered via [`DataSourceRegistry::register`] before requests are served.
/// 2. [`validate`](DataSource::validate) runs when the user submits the form.
/// 3. [`get_items`](DataSource::get_items) runs in the host's worker; the
///    items are handed to the host's dataset writer.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type identifier (e.g. `"news2023"`).
    fn id(&self) -> &str;

    /// Title displayed in the host UI.
    fn title(&self) -> &str;

    fn description(&self) -> &str;

    /// Host category for grouping data sources.
    fn category(&self) -> &str {
        "Search"
    }

    /// Result file extension used by the host's dataset writer.
    fn extension(&self) -> &str {
        "ndjson"
    }

    /// Check a request before a dataset is created. Returns the hit count.
    async fn validate(&self, request: &SearchRequest, confirmed: bool) -> Result<u64>;

    /// Fetch the items for a request, up to `cap`.
    async fn get_items(&self, request: &SearchRequest, cap: Option<usize>) -> Result<SearchOutcome>;

    /// [`get_items`](DataSource::get_items) with progress events. Sources
    /// that cannot report progress just fetch.
    async fn get_items_with_progress(
        &self,
        request: &SearchRequest,
        cap: Option<usize>,
        _progress: &dyn SearchProgressReporter,
    ) -> Result<SearchOutcome> {
        self.get_items(request, cap).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RecurringJob Trait
// ═══════════════════════════════════════════════════════════════════════

/// Work the host runs on its own scheduler at a fixed interval.
#[async_trait]
pub trait RecurringJob: Send + Sync {
    fn job_type(&self) -> &str;

    /// Identifier the host uses to keep exactly one instance of the job.
    fn remote_id(&self) -> &str;

    fn interval(&self) -> Duration;

    /// One unit of work. Failures are logged, never returned.
    async fn work(&self);
}

// ═══════════════════════════════════════════════════════════════════════
// Registries
// ═══════════════════════════════════════════════════════════════════════

/// Registry of data sources, keyed by [`DataSource::id`].
pub struct DataSourceRegistry {
    sources: Vec<Box<dyn DataSource>>,
}

impl DataSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a data source. A later registration with the same id
    /// replaces the earlier one.
    pub fn register(&mut self, source: Box<dyn DataSource>) {
        self.sources.retain(|s| s.id() != source.id());
        self.sources.push(source);
    }

    pub fn get(&self, id: &str) -> Option<&dyn DataSource> {
        self.sources
            .iter()
            .find(|s| s.id() == id)
            .map(|s| s.as_ref())
    }

    pub fn sources(&self) -> &[Box<dyn DataSource>] {
        &self.sources
    }

    pub fn ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl Default for DataSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of recurring jobs, keyed by [`RecurringJob::remote_id`].
pub struct JobRegistry {
    jobs: Vec<std::sync::Arc<dyn RecurringJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    pub fn register(&mut self, job: std::sync::Arc<dyn RecurringJob>) {
        self.jobs.retain(|j| j.remote_id() != job.remote_id());
        self.jobs.push(job);
    }

    pub fn get(&self, remote_id: &str) -> Option<std::sync::Arc<dyn RecurringJob>> {
        self.jobs
            .iter()
            .find(|j| j.remote_id() == remote_id)
            .cloned()
    }

    pub fn jobs(&self) -> &[std::sync::Arc<dyn RecurringJob>] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
