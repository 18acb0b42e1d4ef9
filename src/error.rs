use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures surfaced by the Webjutter client, translator and poller.
///
/// Messages are written for the person creating a dataset; they end up in
/// the host's status line verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Could not reach Webjutter: {0}")]
    RemoteUnavailable(String),

    #[error("Webjutter rejected the configured credentials (status {status})")]
    AuthenticationFailed { status: u16 },

    #[error("Invalid query: {0}")]
    MalformedQuery(String),

    #[error("Unknown Webjutter collection '{0}'")]
    CollectionUnknown(String),

    #[error("Webjutter collection overview is {age_secs}s old")]
    StaleOverview { age_secs: u64 },

    #[error("Webjutter is not configured. Set a URL, user and password.")]
    NotConfigured,

    #[error("Webjutter is reachable, but the available datasources couldn't be read: {0}")]
    OverviewUnreadable(String),

    #[error("Your search does not result in any results.")]
    NoResults,

    #[error("Your search matches {total} items. Do you still want to continue?")]
    NeedsConfirmation { total: u64 },

    #[error("Fetched the Webjutter overview but could not store it: {0}")]
    OverviewWriteFailed(String),
}

impl BridgeError {
    /// Short machine-readable code, used in JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::RemoteUnavailable(_) => "remote_unavailable",
            BridgeError::AuthenticationFailed { .. } => "authentication_failed",
            BridgeError::MalformedQuery(_) => "malformed_query",
            BridgeError::CollectionUnknown(_) => "collection_unknown",
            BridgeError::StaleOverview { .. } => "stale_overview",
            BridgeError::NotConfigured => "not_configured",
            BridgeError::OverviewUnreadable(_) => "overview_unreadable",
            BridgeError::NoResults => "no_results",
            BridgeError::NeedsConfirmation { .. } => "needs_confirmation",
            BridgeError::OverviewWriteFailed(_) => "overview_write_failed",
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BridgeError::RemoteUnavailable(format!("request timed out: {}", err))
        } else {
            BridgeError::RemoteUnavailable(err.to_string())
        }
    }
}
