//! Overview Poller: keeps the stored collection overview in step with the
//! remote service.
//!
//! Each tick runs `Idle → Checking → {Healthy, Unreachable}`:
//!
//! 1. Probe the remote with the configured credentials.
//! 2. On success, fetch `api/overview`, validate it, and atomically replace
//!    the stored file.
//! 3. Any failure leaves the stored file untouched. The next tick is the
//!    retry; there is no backoff beyond the fixed interval.
//!
//! Only one tick does the probe-fetch-replace sequence at a time. A tick that
//! fires while another is in flight returns [`TickOutcome::Skipped`] instead
//! of queueing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::client::WebjutterClient;
use crate::error::BridgeError;
use crate::overview::OverviewStore;
use crate::traits::RecurringJob;

/// Job identifier under which the host schedules the poller.
pub const JOB_TYPE: &str = "webjutter-updater";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No tick has run yet.
    Idle,
    Checking,
    /// The last tick stored a fresh overview.
    Healthy,
    /// The last tick failed; any earlier overview is still in place.
    Unreachable,
    /// The remote answered but the overview could not be written locally.
    StoreFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy { collections: usize },
    Unreachable(BridgeError),
    /// Fetched, but writing the local file failed.
    StoreFailed(BridgeError),
    NotConfigured,
    /// Another tick was still running.
    Skipped,
}

pub struct OverviewPoller {
    client: Option<WebjutterClient>,
    store: OverviewStore,
    interval: Duration,
    state: Mutex<PollState>,
    last_success: Mutex<Option<DateTime<Utc>>>,
    in_flight: tokio::sync::Mutex<()>,
}

impl OverviewPoller {
    pub fn new(client: Option<WebjutterClient>, store: OverviewStore, interval: Duration) -> Self {
        Self {
            client,
            store,
            interval,
            state: Mutex::new(PollState::Idle),
            last_success: Mutex::new(None),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> PollState {
        self.state.lock().map(|s| *s).unwrap_or(PollState::Unreachable)
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success.lock().ok().and_then(|s| *s)
    }

    pub fn store(&self) -> &OverviewStore {
        &self.store
    }

    fn set_state(&self, next: PollState) {
        if let Ok(mut s) = self.state.lock() {
            *s = next;
        }
    }

    /// Run one poll tick.
    pub async fn tick(&self) -> TickOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Overview poll already in flight, skipping tick");
            return TickOutcome::Skipped;
        };

        let Some(client) = &self.client else {
            debug!("Webjutter not configured, nothing to poll");
            return TickOutcome::NotConfigured;
        };

        self.set_state(PollState::Checking);

        if let Err(e) = client.probe().await {
            return self.unreachable(e);
        }

        let fetched = match client.fetch_overview().await {
            Ok(f) => f,
            Err(e) => return self.unreachable(e),
        };

        if let Err(e) = self.store.replace(&fetched.raw) {
            error!(path = %self.store.path().display(), error = %e, "Failed to store Webjutter overview");
            self.set_state(PollState::StoreFailed);
            return TickOutcome::StoreFailed(BridgeError::OverviewWriteFailed(format!(
                "{}: {}",
                self.store.path().display(),
                e
            )));
        }

        let collections = fetched.overview.len();
        info!(
            path = %self.store.path().display(),
            collections,
            "Updated Webjutter datasources"
        );
        if let Ok(mut last) = self.last_success.lock() {
            *last = Some(Utc::now());
        }
        self.set_state(PollState::Healthy);
        TickOutcome::Healthy { collections }
    }

    fn unreachable(&self, err: BridgeError) -> TickOutcome {
        warn!(
            error = %err,
            kept_previous = self.store.exists(),
            "Couldn't update Webjutter datasources"
        );
        self.set_state(PollState::Unreachable);
        TickOutcome::Unreachable(err)
    }

    /// Tick on the fixed interval until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "Webjutter overview poller started");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Webjutter overview poller stopping");
                    break;
                }
                _ = timer.tick() => {
                    let outcome = self.tick().await;
                    debug!(?outcome, "Poll tick finished");
                }
            }
        }
    }
}

#[async_trait]
impl RecurringJob for OverviewPoller {
    fn job_type(&self) -> &str {
        JOB_TYPE
    }

    fn remote_id(&self) -> &str {
        JOB_TYPE
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn work(&self) {
        self.tick().await;
    }
}
