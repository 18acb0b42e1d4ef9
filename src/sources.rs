use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::overview::OverviewStore;

/// One collection as listed by `wjb sources`.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub id: String,
    pub name: String,
    pub total_records: Option<String>,
    pub up_until: Option<String>,
}

/// Collections in the stored overview. Empty when there is no overview.
pub fn get_collections(store: &OverviewStore) -> Result<Vec<CollectionStatus>> {
    let Some(overview) = store.load()? else {
        return Ok(Vec::new());
    };

    Ok(overview
        .collections
        .iter()
        .map(|(id, info)| {
            let stats = info.elastic.as_ref();
            CollectionStatus {
                id: id.clone(),
                name: info.label(id).to_string(),
                total_records: stats
                    .and_then(|s| s.total_records.as_ref())
                    .map(display_value),
                up_until: stats.and_then(|s| s.up_until.as_ref()).map(display_value),
            }
        })
        .collect())
}

fn display_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn list_sources(config: &Config) -> Result<()> {
    let store = OverviewStore::new(config.overview_path());

    if !config.is_configured() {
        println!("Webjutter is not configured.");
    }

    if !store.exists() {
        println!("No collection overview at {}.", store.path().display());
        println!("Run `wjb poll` once Webjutter is reachable.");
        return Ok(());
    }

    let collections = get_collections(&store)?;

    println!("{:<20} {:<28} {:>14} LATEST", "COLLECTION", "NAME", "RECORDS");
    for c in &collections {
        println!(
            "{:<20} {:<28} {:>14} {}",
            c.id,
            c.name,
            c.total_records.as_deref().unwrap_or("-"),
            c.up_until.as_deref().unwrap_or("-")
        );
    }

    if let Some(age) = store.age() {
        let stale = store.check_freshness(config.poller.stale_after()).is_err();
        println!(
            "\noverview updated {}s ago{}",
            age.as_secs(),
            if stale { " (stale)" } else { "" }
        );
    }

    Ok(())
}
