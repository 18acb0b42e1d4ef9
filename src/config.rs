//! TOML configuration.
//!
//! ```toml
//! [webjutter]
//! url = "http://localhost:4228"
//! user = "admin"
//! password = "secret"
//! timeout_secs = 20
//!
//! [paths]
//! root = "/opt/4cat"
//! # overview_file = "/opt/4cat/config/extensions/webjutter_datasources.json"
//!
//! [poller]
//! interval_secs = 120
//! stale_after_ticks = 5
//!
//! [search]
//! max_items = 10000000
//! page_delay_ms = 500
//! validate_timeout_secs = 5
//! confirm_threshold = 50000
//! ```
//!
//! Every section is optional. An unconfigured `[webjutter]` section is not an
//! error: the poller and translator simply report that Webjutter is not set up.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Location of the collection overview relative to the host root.
pub const OVERVIEW_RELATIVE_PATH: &str = "config/extensions/webjutter_datasources.json";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub webjutter: WebjutterConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// The three host-level settings plus the per-call timeout.
#[derive(Deserialize, Clone)]
pub struct WebjutterConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebjutterConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for WebjutterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebjutterConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &redacted(&self.password))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub overview_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            overview_file: None,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_stale_after_ticks")]
    pub stale_after_ticks: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            stale_after_ticks: default_stale_after_ticks(),
        }
    }
}

fn default_interval_secs() -> u64 {
    120
}
fn default_stale_after_ticks() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_validate_timeout_secs")]
    pub validate_timeout_secs: u64,
    #[serde(default = "default_confirm_threshold")]
    pub confirm_threshold: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            page_delay_ms: default_page_delay_ms(),
            validate_timeout_secs: default_validate_timeout_secs(),
            confirm_threshold: default_confirm_threshold(),
        }
    }
}

fn default_max_items() -> usize {
    10_000_000
}
fn default_page_delay_ms() -> u64 {
    500
}
fn default_validate_timeout_secs() -> u64 {
    5
}
fn default_confirm_threshold() -> u64 {
    50_000
}

impl SearchConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn validate_timeout(&self) -> Duration {
        Duration::from_secs(self.validate_timeout_secs)
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Age after which a stored overview counts as stale.
    pub fn stale_after(&self) -> Duration {
        self.interval() * self.stale_after_ticks.max(1)
    }
}

/// Remote URL and credentials, handed to the client, translator and poller
/// at construction time.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(url: &str, user: &str, password: &str, timeout: Duration) -> Self {
        Self {
            base_url: url.trim().trim_end_matches('/').to_string(),
            user: user.to_string(),
            password: password.to_string(),
            timeout,
        }
    }

    /// Joins an API path (without leading slash) onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &redacted(&self.password))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

impl Config {
    /// Connection settings, or `None` unless URL, user and password are all set.
    pub fn connection(&self) -> Option<ConnectionConfig> {
        let wj = &self.webjutter;
        if wj.url.trim().is_empty() || wj.user.trim().is_empty() || wj.password.trim().is_empty()
        {
            return None;
        }
        Some(ConnectionConfig::new(
            &wj.url,
            &wj.user,
            &wj.password,
            Duration::from_secs(wj.timeout_secs),
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.connection().is_some()
    }

    /// Path of the persisted collection overview.
    pub fn overview_path(&self) -> PathBuf {
        match &self.paths.overview_file {
            Some(path) => path.clone(),
            None => self.paths.root.join(OVERVIEW_RELATIVE_PATH),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.webjutter.timeout_secs == 0 {
        anyhow::bail!("webjutter.timeout_secs must be > 0");
    }

    if config.poller.interval_secs == 0 {
        anyhow::bail!("poller.interval_secs must be > 0");
    }

    if config.search.max_items == 0 {
        anyhow::bail!("search.max_items must be > 0");
    }

    if config.search.validate_timeout_secs == 0 {
        anyhow::bail!("search.validate_timeout_secs must be > 0");
    }

    let url = config.webjutter.url.trim();
    if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!(
            "webjutter.url must start with http:// or https:// (got '{}')",
            url
        );
    }

    Ok(())
}
