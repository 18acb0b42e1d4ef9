//! # Webjutter Bridge
//!
//! Exposes the collections of a remote Webjutter search service as data
//! sources of a research host, and keeps a local copy of the service's
//! collection overview current.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐  probe + fetch  ┌─────────────────┐
//! │ OverviewPoller │────────────────▶│    Webjutter    │
//! │  (recurring)   │                 │    /api/...     │
//! └──────┬─────────┘                 └────────▲────────┘
//!        │ atomic replace                     │ paged search
//!        ▼                                    │
//! ┌────────────────┐  known ids      ┌────────┴────────┐
//! │ OverviewStore  │────────────────▶│ QueryTranslator │──▶ ResultItems
//! │ (JSON on disk) │                 └─────────────────┘
//! └──────┬─────────┘
//!        ▼
//!   HostAdapter: one DataSource per collection + the updater job
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wjb poll                                    # fetch the overview once
//! wjb sources                                 # list known collections
//! wjb validate news2023 climate               # count matching items
//! wjb search news2023 climate --since 2023-01-01 --output climate.ndjson
//! wjb worker                                  # keep the overview current
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy shared by poller and translator |
//! | [`models`] | Search requests, result items, outcomes |
//! | [`client`] | HTTP client for the Webjutter API |
//! | [`overview`] | Collection overview format and on-disk store |
//! | [`poller`] | Recurring overview refresh job |
//! | [`translator`] | Query composition and paged retrieval |
//! | [`mapping`] | Per-collection result mapping |
//! | [`options`] | Settings schema and data-source form options |
//! | [`traits`] | `DataSource` / `RecurringJob` seams and registries |
//! | [`host`] | Wires everything into the host registries |
//! | [`progress`] | Search progress reporting |
//! | [`search`] | `wjb search` / `wjb validate` |
//! | [`sources`] | `wjb sources` |

pub mod client;
pub mod config;
pub mod error;
pub mod host;
pub mod mapping;
pub mod models;
pub mod options;
pub mod overview;
pub mod poller;
pub mod progress;
pub mod search;
pub mod sources;
pub mod traits;
pub mod translator;
