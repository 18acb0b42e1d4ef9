//! Query Translator: turns a [`SearchRequest`] into paged calls against a
//! collection's search endpoint and maps the returned records.
//!
//! # Workflow
//!
//! 1. Check the request locally (non-empty query).
//! 2. Check the collection against the stored overview. Unknown collections
//!    fail with [`BridgeError::CollectionUnknown`] before any HTTP call.
//! 3. Page through results with the `search_after` cursor until the remote
//!    runs out, or the item cap is hit.
//! 4. If a page after the first fails, the items already collected are
//!    returned with a [`Truncation::PageFailed`] marker instead of an error.
//!
//! The query text itself is never rewritten. Field filters and date ranges
//! are ANDed in front of the parenthesised query.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::WebjutterClient;
use crate::config::SearchConfig;
use crate::error::{BridgeError, Result};
use crate::mapping::map_item;
use crate::models::{DateRange, SearchOutcome, SearchRequest, Truncation};
use crate::overview::{CollectionOverview, OverviewStore};
use crate::progress::{NoProgress, SearchProgressEvent, SearchProgressReporter};

pub struct QueryTranslator {
    client: Option<WebjutterClient>,
    store: OverviewStore,
    settings: SearchConfig,
    stale_after: Duration,
}

impl QueryTranslator {
    /// `client` is `None` when Webjutter is not configured; searches then
    /// fail with [`BridgeError::NotConfigured`].
    pub fn new(
        client: Option<WebjutterClient>,
        store: OverviewStore,
        settings: SearchConfig,
        stale_after: Duration,
    ) -> Self {
        Self {
            client,
            store,
            settings,
            stale_after,
        }
    }

    pub fn store(&self) -> &OverviewStore {
        &self.store
    }

    /// Preflight a request: count hits without fetching them.
    ///
    /// Returns the hit count. Zero hits is [`BridgeError::NoResults`]; more
    /// than the confirmation threshold is [`BridgeError::NeedsConfirmation`]
    /// unless `confirmed` is set.
    pub async fn validate(&self, request: &SearchRequest, confirmed: bool) -> Result<u64> {
        let client = self.prepare(request)?;
        let query = compose_query(request);

        let page = client
            .search_page(
                request.collection.trim(),
                &query,
                None,
                Some(0),
                Some(self.settings.validate_timeout()),
            )
            .await?;

        let total = page.total.unwrap_or(page.results.len() as u64);
        if total == 0 {
            return Err(BridgeError::NoResults);
        }
        if !confirmed && total > self.settings.confirm_threshold {
            return Err(BridgeError::NeedsConfirmation { total });
        }
        Ok(total)
    }

    /// Fetch all results for `request`, up to `cap` items (and never more
    /// than the configured maximum).
    pub async fn search(&self, request: &SearchRequest, cap: Option<usize>) -> Result<SearchOutcome> {
        self.search_with_progress(request, cap, &NoProgress).await
    }

    pub async fn search_with_progress(
        &self,
        request: &SearchRequest,
        cap: Option<usize>,
        progress: &dyn SearchProgressReporter,
    ) -> Result<SearchOutcome> {
        let client = self.prepare(request)?;
        let query = compose_query(request);
        let collection = request.collection.trim();
        let cap = cap
            .unwrap_or(self.settings.max_items)
            .min(self.settings.max_items);

        progress.report(SearchProgressEvent::Connecting {
            collection: collection.to_string(),
        });
        info!(collection, query = %query, cap, "Starting Webjutter search");

        let mut items = Vec::new();
        let mut total = None;
        let mut cursor = None;
        let mut pages = 0usize;
        let mut truncation = None;

        loop {
            let page_no = pages + 1;
            let page = match client
                .search_page(collection, &query, cursor.as_ref(), None, None)
                .await
            {
                Ok(page) => page,
                Err(e) if pages == 0 => return Err(e),
                Err(e) => {
                    warn!(collection, page = page_no, error = %e, "Search page failed, keeping earlier pages");
                    truncation = Some(Truncation::PageFailed {
                        page: page_no,
                        error: e,
                    });
                    break;
                }
            };
            pages = page_no;

            if page.results.is_empty() {
                debug!(collection, page = page_no, "Empty page, done");
                break;
            }
            if page.total.is_some() {
                total = page.total;
            }

            let page_len = page.results.len();
            let room = cap.saturating_sub(items.len());
            items.extend(page.results.into_iter().take(room).map(map_item));

            progress.report(SearchProgressEvent::Retrieved {
                collection: collection.to_string(),
                n: items.len() as u64,
                total,
            });

            let more_remote = page.search_after.is_some();
            if items.len() >= cap && (page_len > room || more_remote) {
                info!(collection, cap, "Item cap reached");
                truncation = Some(Truncation::ItemCap { cap });
                break;
            }

            match page.search_after {
                Some(next) => {
                    cursor = Some(next);
                    let delay = self.settings.page_delay();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                None => break,
            }
        }

        progress.report(SearchProgressEvent::Finished {
            collection: collection.to_string(),
            n: items.len() as u64,
            truncated: truncation.is_some(),
        });
        info!(
            collection,
            items = items.len(),
            pages,
            truncated = truncation.is_some(),
            "Webjutter search finished"
        );

        Ok(SearchOutcome {
            datasource: collection.to_string(),
            items,
            total,
            pages,
            truncation,
        })
    }

    /// Local checks shared by `validate` and `search`. No network I/O.
    fn prepare(&self, request: &SearchRequest) -> Result<&WebjutterClient> {
        if request.query.trim().is_empty() {
            return Err(BridgeError::MalformedQuery(
                "You must provide a search query.".to_string(),
            ));
        }

        let overview = self.current_overview()?;
        let collection = request.collection.trim();
        if collection.is_empty() || !overview.contains(collection) {
            return Err(BridgeError::CollectionUnknown(request.collection.clone()));
        }

        self.client.as_ref().ok_or(BridgeError::NotConfigured)
    }

    fn current_overview(&self) -> Result<CollectionOverview> {
        if let Err(stale) = self.store.check_freshness(self.stale_after) {
            warn!(path = %self.store.path().display(), "{}", stale);
        }
        match self.store.load()? {
            Some(ov) => Ok(ov),
            None => Ok(CollectionOverview {
                collections: Default::default(),
                extra: Default::default(),
            }),
        }
    }
}

/// Build the query string sent as `q`.
pub fn compose_query(request: &SearchRequest) -> String {
    let mut clauses: Vec<String> = request
        .filters
        .iter()
        .map(|f| format!("{}:{}", f.field, quote_value(&f.value)))
        .collect();

    if let Some(range) = &request.date_range {
        if let Some(clause) = date_clause(range) {
            clauses.push(clause);
        }
    }

    if clauses.is_empty() {
        return request.query.clone();
    }
    clauses.push(format!("({})", request.query));
    clauses.join(" AND ")
}

fn date_clause(range: &DateRange) -> Option<String> {
    if range.since.is_none() && range.until.is_none() {
        return None;
    }
    let bound = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "*".to_string())
    };
    Some(format!(
        "{}:[{} TO {}]",
        range.field,
        bound(range.since),
        bound(range.until)
    ))
}

fn quote_value(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}
