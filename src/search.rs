//! `wjb search` and `wjb validate`.
//!
//! Results are written as NDJSON, one mapped item per line, to stdout or to
//! `--output`. Progress and truncation notices go to stderr.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::config::Config;
use crate::error::BridgeError;
use crate::host::HostAdapter;
use crate::models::{DateRange, SearchOutcome, SearchRequest};
use crate::progress::ProgressMode;
use crate::traits::DataSource;

/// Options shared by `search` and `validate`.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub since: Option<String>,
    pub until: Option<String>,
    pub date_field: String,
    pub filters: Vec<(String, String)>,
    pub limit: Option<usize>,
    pub confirm: bool,
    pub output: Option<PathBuf>,
    pub progress: Option<String>,
}

/// Build a [`SearchRequest`] from CLI arguments.
pub fn build_request(collection: &str, query: &str, args: &SearchArgs) -> Result<SearchRequest> {
    let mut req = SearchRequest::new(collection, query);

    let since = parse_date(args.since.as_deref(), "--since")?;
    let until = parse_date(args.until.as_deref(), "--until")?;
    if let (Some(s), Some(u)) = (since, until) {
        if s > u {
            bail!("--since ({}) is after --until ({})", s, u);
        }
    }
    if since.is_some() || until.is_some() {
        let field = if args.date_field.trim().is_empty() {
            "timestamp".to_string()
        } else {
            args.date_field.clone()
        };
        req = req.with_date_range(DateRange { field, since, until });
    }

    for (field, value) in &args.filters {
        req = req.with_filter(field.clone(), value.clone());
    }
    Ok(req)
}

fn parse_date(value: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("Invalid {} date '{}', expected YYYY-MM-DD", flag, s))
        })
        .transpose()
}

/// The registered source for `collection`, as the host would resolve it.
fn resolve<'a>(adapter: &'a HostAdapter, collection: &str) -> Result<&'a dyn DataSource> {
    let source = adapter
        .data_sources()
        .get(collection.trim())
        .ok_or_else(|| BridgeError::CollectionUnknown(collection.to_string()))?;
    Ok(source)
}

pub async fn run_validate(
    config: &Config,
    collection: &str,
    query: &str,
    args: &SearchArgs,
) -> Result<()> {
    let adapter = HostAdapter::load(config)?;
    let request = build_request(collection, query, args)?;

    let source = resolve(&adapter, collection)?;

    let total = source.validate(&request, args.confirm).await?;
    println!("{} matching items in {}", total, source.id());
    Ok(())
}

pub async fn run_search(
    config: &Config,
    collection: &str,
    query: &str,
    args: &SearchArgs,
) -> Result<()> {
    let adapter = HostAdapter::load(config)?;
    let request = build_request(collection, query, args)?;

    let mode = match args.progress.as_deref() {
        None => ProgressMode::default_for_tty(),
        Some(s) => match ProgressMode::parse(s) {
            Some(m) => m,
            None => bail!("Unknown progress mode: {}. Use off, human, or json.", s),
        },
    };
    let reporter = mode.reporter();

    let source = resolve(&adapter, collection)?;
    if !args.confirm {
        source.validate(&request, false).await?;
    }
    let outcome = source
        .get_items_with_progress(&request, args.limit, reporter.as_ref())
        .await?;

    write_outcome(&outcome, args.output.as_ref())?;

    if let Some(t) = &outcome.truncation {
        eprintln!(
            "Warning: results truncated after {} items ({})",
            outcome.items.len(),
            t
        );
    }
    Ok(())
}

fn write_outcome(outcome: &SearchOutcome, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_ndjson(outcome, BufWriter::new(file))?;
            eprintln!(
                "Wrote {} items from {} to {}",
                outcome.items.len(),
                outcome.datasource,
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            write_ndjson(outcome, BufWriter::new(stdout.lock()))?;
        }
    }
    Ok(())
}

/// Write each item as one JSON line.
pub fn write_ndjson<W: Write>(outcome: &SearchOutcome, mut out: W) -> Result<()> {
    for item in &outcome.items {
        serde_json::to_writer(&mut out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultItem;
    use serde_json::{json, Map};

    #[test]
    fn builds_request_with_dates_and_filters() {
        let args = SearchArgs {
            since: Some("2020-01-01".into()),
            until: Some("2022-12-31".into()),
            date_field: "time".into(),
            filters: vec![("board".into(), "mu".into())],
            ..Default::default()
        };
        let req = build_request("fourchan", "com:sax*", &args).unwrap();
        let range = req.date_range.unwrap();
        assert_eq!(range.field, "time");
        assert_eq!(range.since, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(req.filters[0].value, "mu");
    }

    #[test]
    fn rejects_bad_and_inverted_dates() {
        let bad = SearchArgs {
            since: Some("01/01/2020".into()),
            ..Default::default()
        };
        assert!(build_request("c", "q", &bad).is_err());

        let inverted = SearchArgs {
            since: Some("2022-01-01".into()),
            until: Some("2020-01-01".into()),
            ..Default::default()
        };
        assert!(build_request("c", "q", &inverted).is_err());
    }

    #[test]
    fn default_date_field() {
        let args = SearchArgs {
            until: Some("2020-01-01".into()),
            ..Default::default()
        };
        let req = build_request("c", "q", &args).unwrap();
        assert_eq!(req.date_range.unwrap().field, "timestamp");
    }

    #[test]
    fn ndjson_one_line_per_item() {
        let mut a = Map::new();
        a.insert("id".into(), json!(1));
        let mut b = Map::new();
        b.insert("id".into(), json!(2));
        let outcome = SearchOutcome {
            datasource: "news2023".into(),
            items: vec![ResultItem::new(a), ResultItem::new(b)],
            total: Some(2),
            pages: 1,
            truncation: None,
        };
        let mut buf = Vec::new();
        write_ndjson(&outcome, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\"id\":1}\n{\"id\":2}\n");
    }
}
