//! Host adapter: wires the translator and poller into the host's
//! data-source and job registries.
//!
//! The registry is built once from the overview on disk at load time. One
//! [`WebjutterDataSource`] is registered per collection; the poller is
//! registered as the `webjutter-updater` job.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::WebjutterClient;
use crate::config::Config;
use crate::error::Result as BridgeResult;
use crate::models::{SearchOutcome, SearchRequest};
use crate::options::{datasource_options, settings_schema, FormOption};
use crate::overview::{CollectionOverview, OverviewStore};
use crate::poller::OverviewPoller;
use crate::progress::SearchProgressReporter;
use crate::traits::{DataSource, DataSourceRegistry, JobRegistry};
use crate::translator::QueryTranslator;

/// Static description of one remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl CollectionDescriptor {
    /// One descriptor per collection, in overview order.
    pub fn from_overview(overview: &CollectionOverview) -> Vec<Self> {
        overview
            .collections
            .iter()
            .map(|(id, info)| CollectionDescriptor {
                id: id.clone(),
                title: format!("{} (Webjutter)", info.label(id)),
                description: info
                    .description
                    .clone()
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| "Retrieve Webjutter data.".to_string()),
            })
            .collect()
    }
}

/// A remote collection exposed as a host data source.
pub struct WebjutterDataSource {
    descriptor: CollectionDescriptor,
    translator: Arc<QueryTranslator>,
}

impl WebjutterDataSource {
    pub fn new(descriptor: CollectionDescriptor, translator: Arc<QueryTranslator>) -> Self {
        Self {
            descriptor,
            translator,
        }
    }

    /// Requests routed through this source always target its collection.
    fn scoped(&self, request: &SearchRequest) -> SearchRequest {
        let mut req = request.clone();
        req.collection = self.descriptor.id.clone();
        req
    }
}

#[async_trait]
impl DataSource for WebjutterDataSource {
    fn id(&self) -> &str {
        &self.descriptor.id
    }

    fn title(&self) -> &str {
        &self.descriptor.title
    }

    fn description(&self) -> &str {
        &self.descriptor.description
    }

    async fn validate(&self, request: &SearchRequest, confirmed: bool) -> BridgeResult<u64> {
        self.translator
            .validate(&self.scoped(request), confirmed)
            .await
    }

    async fn get_items(
        &self,
        request: &SearchRequest,
        cap: Option<usize>,
    ) -> BridgeResult<SearchOutcome> {
        self.translator.search(&self.scoped(request), cap).await
    }

    async fn get_items_with_progress(
        &self,
        request: &SearchRequest,
        cap: Option<usize>,
        progress: &dyn SearchProgressReporter,
    ) -> BridgeResult<SearchOutcome> {
        self.translator
            .search_with_progress(&self.scoped(request), cap, progress)
            .await
    }
}

/// Everything the host needs from this extension.
pub struct HostAdapter {
    config: Config,
    translator: Arc<QueryTranslator>,
    poller: Arc<OverviewPoller>,
    data_sources: DataSourceRegistry,
    jobs: JobRegistry,
}

impl HostAdapter {
    /// Build the adapter from configuration and the overview currently on disk.
    pub fn load(config: &Config) -> Result<Self> {
        let store = OverviewStore::new(config.overview_path());

        let client = match config.connection() {
            Some(conn) => Some(WebjutterClient::new(conn)?),
            None => {
                info!("Webjutter is not configured; no collections will be registered");
                None
            }
        };

        let translator = Arc::new(QueryTranslator::new(
            client.clone(),
            store.clone(),
            config.search.clone(),
            config.poller.stale_after(),
        ));
        let poller = Arc::new(OverviewPoller::new(
            client,
            store.clone(),
            config.poller.interval(),
        ));

        let mut data_sources = DataSourceRegistry::new();
        match store.load() {
            Ok(Some(overview)) => {
                for descriptor in CollectionDescriptor::from_overview(&overview) {
                    data_sources.register(Box::new(WebjutterDataSource::new(
                        descriptor,
                        translator.clone(),
                    )));
                }
                info!(
                    collections = data_sources.len(),
                    "Registered Webjutter data sources"
                );
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable Webjutter overview"),
        }

        let mut jobs = JobRegistry::new();
        jobs.register(poller.clone());

        Ok(Self {
            config: config.clone(),
            translator,
            poller,
            data_sources,
            jobs,
        })
    }

    pub fn data_sources(&self) -> &DataSourceRegistry {
        &self.data_sources
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn poller(&self) -> Arc<OverviewPoller> {
        self.poller.clone()
    }

    pub fn translator(&self) -> Arc<QueryTranslator> {
        self.translator.clone()
    }

    pub fn settings_schema(&self) -> Vec<FormOption> {
        settings_schema()
    }

    pub fn options(&self) -> Vec<FormOption> {
        datasource_options(&self.config, self.translator.store())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(tmp: &TempDir, configured: bool) -> Config {
        let creds = if configured {
            "url = \"http://127.0.0.1:9\"\nuser = \"u\"\npassword = \"p\"\n"
        } else {
            ""
        };
        toml::from_str(&format!(
            "[webjutter]\n{}\n[paths]\nroot = \"{}\"\n",
            creds,
            tmp.path().display()
        ))
        .unwrap()
    }

    #[test]
    fn registers_one_source_per_collection() {
        let tmp = TempDir::new().unwrap();
        let cfg = config_in(&tmp, true);
        OverviewStore::new(cfg.overview_path())
            .replace(br#"{"collections": {"news2023": {"name": "News"}, "fourchan": {"description": "Posts"}}}"#)
            .unwrap();

        let adapter = HostAdapter::load(&cfg).unwrap();
        assert_eq!(adapter.data_sources().ids(), vec!["fourchan", "news2023"]);

        let news = adapter.data_sources().get("news2023").unwrap();
        assert_eq!(news.title(), "News (Webjutter)");
        assert_eq!(news.description(), "Retrieve Webjutter data.");
        assert_eq!(
            adapter.data_sources().get("fourchan").unwrap().description(),
            "Posts"
        );

        assert_eq!(adapter.jobs().len(), 1);
        assert!(adapter.jobs().get("webjutter-updater").is_some());
    }

    #[test]
    fn no_overview_means_no_sources() {
        let tmp = TempDir::new().unwrap();
        let adapter = HostAdapter::load(&config_in(&tmp, false)).unwrap();
        assert!(adapter.data_sources().is_empty());
        assert_eq!(adapter.options()[0].key, "error");
        assert_eq!(adapter.settings_schema().len(), 3);
    }
}
