//! # Webjutter Bridge CLI (`wjb`)
//!
//! Drives the bridge outside a host: refresh the collection overview, list
//! the known collections, and run searches against a collection.
//!
//! ## Usage
//!
//! ```bash
//! wjb --config ./config/wjb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wjb settings` | Print the host settings schema as JSON |
//! | `wjb options` | Print the data-source form options as JSON |
//! | `wjb sources` | List collections in the stored overview |
//! | `wjb poll` | Run one overview refresh |
//! | `wjb worker` | Refresh the overview on the configured interval |
//! | `wjb validate <collection> "<query>"` | Count matching items |
//! | `wjb search <collection> "<query>"` | Retrieve matching items as NDJSON |
//!
//! Logging goes to stderr and honours `RUST_LOG`.

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use webjutter_bridge::config;
use webjutter_bridge::host::HostAdapter;
use webjutter_bridge::options;
use webjutter_bridge::poller::TickOutcome;
use webjutter_bridge::search::{self, SearchArgs};
use webjutter_bridge::sources;

/// Webjutter Bridge CLI.
///
/// All commands except `settings` read a TOML configuration file given by
/// `--config`. See `config/wjb.example.toml`.
#[derive(Parser)]
#[command(
    name = "wjb",
    about = "Webjutter Bridge: search remote Webjutter collections and keep their overview current",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wjb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the host-level settings schema (URL, user, password) as JSON.
    Settings,

    /// Print the options offered when creating a dataset, as JSON.
    ///
    /// Reflects the stored overview: a single explanatory message when
    /// Webjutter is not configured or the overview is missing.
    Options,

    /// List collections in the stored overview.
    Sources,

    /// Probe Webjutter and refresh the stored overview once.
    Poll,

    /// Refresh the overview on the configured interval until interrupted.
    Worker,

    /// Check a query and print the number of matching items.
    Validate {
        collection: String,
        query: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Accept large result sets without confirmation.
        #[arg(long)]
        confirm: bool,
    },

    /// Retrieve matching items as NDJSON.
    Search {
        collection: String,
        query: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Maximum number of items to retrieve.
        #[arg(long)]
        limit: Option<usize>,

        /// Skip the preflight count and its confirmation threshold.
        #[arg(long)]
        confirm: bool,

        /// Write results to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Progress output on stderr: `off`, `human`, or `json`.
        /// Defaults to `human` on a terminal, `off` otherwise.
        #[arg(long)]
        progress: Option<String>,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Only items on or after this date (YYYY-MM-DD).
    #[arg(long)]
    since: Option<String>,

    /// Only items on or before this date (YYYY-MM-DD).
    #[arg(long)]
    until: Option<String>,

    /// Field the date range applies to.
    #[arg(long, default_value = "timestamp")]
    date_field: String,

    /// Exact field match as `field=value`. Repeatable.
    #[arg(long = "filter", value_parser = parse_key_val)]
    filters: Vec<(String, String)>,
}

impl FilterArgs {
    fn into_search_args(self) -> SearchArgs {
        SearchArgs {
            since: self.since,
            until: self.until,
            date_field: self.date_field,
            filters: self.filters,
            ..Default::default()
        }
    }
}

/// Parse a `key=value` pair for `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid FIELD=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG wins when set; otherwise this crate logs at info.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("webjutter_bridge=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        config: config_path,
        command,
    } = Cli::parse();
    // Only `settings` runs without a config file.
    let load = || config::load_config(&config_path);

    match command {
        Commands::Settings => {
            println!(
                "{}",
                serde_json::to_string_pretty(&options::settings_schema())?
            );
        }
        Commands::Options => {
            let adapter = HostAdapter::load(&load()?)?;
            println!("{}", serde_json::to_string_pretty(&adapter.options())?);
        }
        Commands::Sources => {
            sources::list_sources(&load()?)?;
        }
        Commands::Poll => {
            let cfg = load()?;
            let adapter = HostAdapter::load(&cfg)?;
            match adapter.poller().tick().await {
                TickOutcome::Healthy { collections } => {
                    println!(
                        "Stored overview with {} collections at {}",
                        collections,
                        cfg.overview_path().display()
                    );
                }
                TickOutcome::NotConfigured => {
                    bail!("Webjutter is not configured; set [webjutter] url, user and password")
                }
                TickOutcome::Unreachable(e) => bail!("Couldn't update Webjutter datasources: {}", e),
                TickOutcome::StoreFailed(e) => bail!("{}", e),
                TickOutcome::Skipped => println!("A poll is already in progress."),
            }
        }
        Commands::Worker => {
            let adapter = HostAdapter::load(&load()?)?;
            let poller = adapter.poller();
            poller
                .run_until(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await;
        }
        Commands::Validate {
            collection,
            query,
            filter,
            confirm,
        } => {
            let args = SearchArgs {
                confirm,
                ..filter.into_search_args()
            };
            search::run_validate(&load()?, &collection, &query, &args).await?;
        }
        Commands::Search {
            collection,
            query,
            filter,
            limit,
            confirm,
            output,
            progress,
        } => {
            let args = SearchArgs {
                limit,
                confirm,
                output,
                progress,
                ..filter.into_search_args()
            };
            search::run_search(&load()?, &collection, &query, &args).await?;
        }
    }

    Ok(())
}
