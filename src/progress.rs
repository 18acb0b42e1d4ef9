//! Search progress reporting.
//!
//! Emitted on **stderr** so stdout stays parseable NDJSON when `wjb search`
//! is piped into the host's dataset writer.

use std::io::Write;

/// A single progress event for one search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchProgressEvent {
    /// About to request the first page.
    Connecting { collection: String },
    /// `n` items collected so far out of `total` reported hits.
    Retrieved {
        collection: String,
        n: u64,
        total: Option<u64>,
    },
    /// Paging stopped.
    Finished {
        collection: String,
        n: u64,
        truncated: bool,
    },
}

/// Receives progress events from the translator's paging loop.
pub trait SearchProgressReporter: Send + Sync {
    fn report(&self, event: SearchProgressEvent);
}

/// Human-friendly progress on stderr: "search news2023  retrieved 1,000 / 5,000 items".
pub struct StderrProgress;

impl SearchProgressReporter for StderrProgress {
    fn report(&self, event: SearchProgressEvent) {
        let line = match &event {
            SearchProgressEvent::Connecting { collection } => {
                format!("search {}  connecting to Webjutter...\n", collection)
            }
            SearchProgressEvent::Retrieved {
                collection,
                n,
                total,
            } => match total {
                Some(t) => format!(
                    "search {}  retrieved {} / {} items\n",
                    collection,
                    format_number(*n),
                    format_number(*t)
                ),
                None => format!(
                    "search {}  retrieved {} items\n",
                    collection,
                    format_number(*n)
                ),
            },
            SearchProgressEvent::Finished {
                collection,
                n,
                truncated,
            } => format!(
                "search {}  done, {} items{}\n",
                collection,
                format_number(*n),
                if *truncated { " (truncated)" } else { "" }
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SearchProgressReporter for JsonProgress {
    fn report(&self, event: SearchProgressEvent) {
        let obj = match &event {
            SearchProgressEvent::Connecting { collection } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "connecting"
            }),
            SearchProgressEvent::Retrieved {
                collection,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "retrieving",
                "n": n,
                "total": total
            }),
            SearchProgressEvent::Finished {
                collection,
                n,
                truncated,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "finished",
                "n": n,
                "truncated": truncated
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SearchProgressReporter for NoProgress {
    fn report(&self, _event: SearchProgressEvent) {}
}

/// Render an integer with thousands separators: `1234567` → `"1,234,567"`.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn SearchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn parse_mode() {
        assert_eq!(ProgressMode::parse("json"), Some(ProgressMode::Json));
        assert_eq!(ProgressMode::parse("loud"), None);
    }
}
