//! Core data models shared by the translator, the host adapter and the CLI.
//!
//! A [`SearchRequest`] is built once per dataset-creation action and never
//! mutated afterwards. Each remote record becomes a [`ResultItem`], and the
//! items of one request are collected into a [`SearchOutcome`].

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::BridgeError;

/// One user-initiated search against a single collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Query in the remote's query-string syntax. Sent as-is.
    pub query: String,
    /// Collection identifier as listed in the overview.
    pub collection: String,
    pub date_range: Option<DateRange>,
    pub filters: Vec<FieldFilter>,
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection: collection.into(),
            date_range: None,
            filters: Vec::new(),
        }
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }
}

/// Inclusive date bounds on one field. Either end may be open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub field: String,
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

/// Exact-match restriction, e.g. `board:mu`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

/// A remote record mapped into host field names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultItem {
    fields: Map<String, Value>,
}

impl ResultItem {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// String view of a field; numbers are rendered, other types yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// Why a search stopped before the remote ran out of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Truncation {
    /// The host-imposed item cap was reached.
    ItemCap { cap: usize },
    /// A page after the first failed; earlier pages are kept.
    PageFailed { page: usize, error: BridgeError },
}

impl std::fmt::Display for Truncation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Truncation::ItemCap { cap } => write!(f, "stopped at the {} item limit", cap),
            Truncation::PageFailed { page, error } => {
                write!(f, "page {} failed: {}", page, error)
            }
        }
    }
}

/// Items collected for one request.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Collection the dataset belongs to once written.
    pub datasource: String,
    pub items: Vec<ResultItem>,
    /// Total hit count as last reported by the remote.
    pub total: Option<u64>,
    pub pages: usize,
    pub truncation: Option<Truncation>,
}

impl SearchOutcome {
    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }
}
