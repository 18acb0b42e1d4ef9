//! Settings schema and dataset-creation form for the host UI.
//!
//! The form is derived from the stored collection overview each time it is
//! requested, so new collections show up after the next successful poll.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::overview::{CollectionInfo, CollectionOverview, ElasticStats, OverviewStore};
use crate::progress::format_number;

pub const SETTING_URL: &str = "webjutter-search.url";
pub const SETTING_USER: &str = "webjutter-search.user";
pub const SETTING_PASSWORD: &str = "webjutter-search.password";

/// Form option key holding the selected collection.
pub const DATASOURCE_OPTION: &str = "webjutter_datasource";

const QUERY_SYNTAX_HELP: &str = "Webjutter uses [Elasticsearch's query string syntax](https://www.elastic.co/docs/reference/query-languages/query-dsl/query-dsl-query-string-query#query-string-syntax). Make sure to use the correct field names and operators.<br><strong>Example 1:</strong> <code>author:\"John Smith\" OR body:qu?ck bro*</code><br><strong>Example 2:</strong> <code>hashtag:(liminal space) AND timestamp:[2012-01-01 TO 2012-12-31]</code>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKind {
    Text,
    TextLarge,
    Choice,
    Info,
}

/// One setting or form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormOption {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub help: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, String>>,
    /// Show only when this `key==value` condition holds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

impl FormOption {
    fn new(key: impl Into<String>, kind: OptionKind, help: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            help: help.into(),
            tooltip: None,
            default: None,
            options: None,
            requires: None,
            sensitive: false,
        }
    }

    fn info(key: impl Into<String>, help: impl Into<String>) -> Self {
        Self::new(key, OptionKind::Info, help)
    }

    fn tooltip(mut self, tooltip: &str) -> Self {
        self.tooltip = Some(tooltip.to_string());
        self
    }

    fn only_for(mut self, collection: &str) -> Self {
        self.requires = Some(format!("{}=={}", DATASOURCE_OPTION, collection));
        self
    }
}

/// The three host-level settings.
pub fn settings_schema() -> Vec<FormOption> {
    let mut url = FormOption::new(
        SETTING_URL,
        OptionKind::Text,
        "The URL to your Webjutter front-end server",
    )
    .tooltip("If you're running from Docker, this defaults to <URL>:4228:80");
    url.default = Some(String::new());

    let mut user = FormOption::new(SETTING_USER, OptionKind::Text, "Webjutter username")
        .tooltip("This is defined in the .config file of your Webjutter server");
    user.default = Some(String::new());

    let mut password = FormOption::new(SETTING_PASSWORD, OptionKind::Text, "Webjutter password")
        .tooltip("This is defined in the .config file of your Webjutter server");
    password.default = Some(String::new());
    password.sensitive = true;

    vec![url, user, password]
}

/// Build the dataset-creation form.
///
/// When Webjutter is unconfigured, unreachable, or its overview cannot be
/// read, the form is a single `error` info field explaining why.
pub fn datasource_options(config: &Config, store: &OverviewStore) -> Vec<FormOption> {
    if !config.is_configured() {
        return vec![FormOption::info(
            "error",
            "<code>Webjutter is not configured. Insert a valid URL and login in the Control Panel or ask the admin to do so.</code>",
        )];
    }

    let overview = match store.load() {
        Ok(Some(ov)) => ov,
        Ok(None) => {
            return vec![FormOption::info(
                "error",
                "<code>Webjutter is configured but could not reach it. Make sure the Webjutter Search settings are valid in the Control Panel.</code>",
            )]
        }
        Err(_) => {
            return vec![FormOption::info(
                "error",
                "<code>Webjutter is configured and reachable, but the available datasources couldn't be read.</code>",
            )]
        }
    };

    overview_options(&overview)
}

fn overview_options(overview: &CollectionOverview) -> Vec<FormOption> {
    let mut out = vec![FormOption::info(
        "intro",
        "Retrieve any kind of Webjutter item. Max 10 million items are returned.",
    )];

    let labels: BTreeMap<String, String> = overview
        .collections
        .iter()
        .map(|(id, info)| (id.clone(), info.label(id).to_string()))
        .collect();
    let mut choice = FormOption::new(DATASOURCE_OPTION, OptionKind::Choice, "Webjutter collection");
    choice.options = Some(labels);
    out.push(choice);

    for (id, info) in &overview.collections {
        if let Some(desc) = info.description.as_deref().filter(|d| !d.is_empty()) {
            out.push(FormOption::info(format!("{}_description", id), desc).only_for(id));
        }
    }

    for (id, info) in &overview.collections {
        if has_content(info.metadata.as_ref()) {
            out.push(
                FormOption::info(
                    format!("{}_metadata", id),
                    metadata_table(info.metadata.as_ref(), "Metadata", info.elastic.as_ref()),
                )
                .only_for(id),
            );
        }
    }

    out.push(FormOption::info("query_header", "### Querying"));
    out.push(FormOption::info("query_info", QUERY_SYNTAX_HELP));
    out.push(
        FormOption::info(
            "query_info_fourchan",
            "<strong>Example 4chan query:</strong> <code>board:mu AND com:*saxophone* AND time:[2020-01-01 TO 2022-12-31]</code>",
        )
        .only_for("fourchan"),
    );

    for (id, info) in &overview.collections {
        if lists_search_fields(info) {
            continue;
        }
        if let Some(schema) = info.field_schema().filter(|v| has_content(Some(*v))) {
            out.push(
                FormOption::info(
                    format!("{}_query_fields", id),
                    metadata_table(Some(schema), "Search fields", None),
                )
                .only_for(id),
            );
        }
    }

    if let Some(boards) = fourchan_boards(overview) {
        let mut board = FormOption::new("board", OptionKind::Choice, "Board").only_for("fourchan");
        board.options = Some(boards);
        out.push(board);
    }

    out.push(
        FormOption::new("query", OptionKind::TextLarge, "Query")
            .tooltip("See the ElasticSearch documentation for instructions"),
    );
    out
}

fn lists_search_fields(info: &CollectionInfo) -> bool {
    info.description
        .as_deref()
        .map(|d| d.contains("Search fields"))
        .unwrap_or(false)
}

fn has_content(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Object(m)) => !m.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn fourchan_boards(overview: &CollectionOverview) -> Option<BTreeMap<String, String>> {
    let boards = overview
        .get("fourchan")?
        .metadata
        .as_ref()?
        .get("board")?
        .as_object()?;
    if boards.is_empty() {
        return None;
    }
    Some(boards.keys().map(|b| (b.clone(), b.clone())).collect())
}

/// Render collection metadata as a two-column HTML table.
///
/// Nested objects are flattened with `_`-joined labels. When `stats` is
/// given, `Total records` and `Latest` rows come first.
pub fn metadata_table(data: Option<&Value>, header: &str, stats: Option<&ElasticStats>) -> String {
    let mut rows: Vec<(String, String)> = Vec::new();

    if let Some(stats) = stats {
        rows.push((
            "Total records".to_string(),
            cell_value(stats.total_records.as_ref()),
        ));
        rows.push(("Latest".to_string(), cell_value(stats.up_until.as_ref())));
    }

    if let Some(data) = data {
        flatten_into(data, "", &mut rows);
    }

    if rows.is_empty() {
        return "No data available".to_string();
    }

    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <tbody>\n");
    if !header.is_empty() {
        html.push_str(&format!(
            "<tr><th colspan=\"2\" style=\"text-align: center; font-weight: bold;\">{}</th></tr>",
            escape_html(header)
        ));
    }
    for (label, value) in &rows {
        html.push_str(&format!(
            "    <tr>\n      <td>{}</td>\n      <td>{}</td>\n    </tr>\n",
            escape_html(label),
            escape_html(value)
        ));
    }
    html.push_str("  </tbody>\n</table>");
    html
}

fn flatten_into(value: &Value, prefix: &str, rows: &mut Vec<(String, String)>) {
    let Value::Object(map) = value else {
        return;
    };
    for (key, v) in map {
        let label = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}_{}", prefix, key)
        };
        match v {
            Value::Object(_) => flatten_into(v, &label, rows),
            other => rows.push((label, cell_value(Some(other)))),
        }
    }
}

fn cell_value(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "unknown".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(u) => format_number(u),
            None => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn configured() -> Config {
        toml::from_str(
            r#"
[webjutter]
url = "http://wj.local"
user = "u"
password = "p"
"#,
        )
        .unwrap()
    }

    const OVERVIEW: &str = r#"{
        "collections": {
            "fourchan": {
                "name": "4chan",
                "description": "Imageboard posts",
                "metadata": {"board": {"mu": 1500, "g": 20}},
                "elastic": {"total_records": 1234567, "up_until": "2024-05-01"},
                "fields": {"com": "text", "time": "date"}
            },
            "news2023": {
                "description": "News. Search fields: title, body",
                "fields": {"title": "text"}
            }
        }
    }"#;

    #[test]
    fn settings_schema_has_three_string_settings() {
        let schema = settings_schema();
        let keys: Vec<&str> = schema.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec![SETTING_URL, SETTING_USER, SETTING_PASSWORD]);
        assert!(schema.iter().all(|o| o.kind == OptionKind::Text));
        assert!(schema[2].sensitive);
        assert!(!schema[0].sensitive);
    }

    #[test]
    fn unconfigured_form_is_single_error() {
        let tmp = TempDir::new().unwrap();
        let opts = datasource_options(&Config::default(), &OverviewStore::new(tmp.path().join("x")));
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].key, "error");
        assert!(opts[0].help.contains("not configured"));
    }

    #[test]
    fn missing_and_broken_overview_messages() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ov.json");
        let store = OverviewStore::new(&path);

        let opts = datasource_options(&configured(), &store);
        assert!(opts[0].help.contains("could not reach it"));

        std::fs::write(&path, "{").unwrap();
        let opts = datasource_options(&configured(), &store);
        assert!(opts[0].help.contains("couldn't be read"));
    }

    #[test]
    fn form_lists_collections_and_per_collection_fields() {
        let tmp = TempDir::new().unwrap();
        let store = OverviewStore::new(tmp.path().join("ov.json"));
        store.replace(OVERVIEW.as_bytes()).unwrap();

        let opts = datasource_options(&configured(), &store);
        let find = |k: &str| opts.iter().find(|o| o.key == k);

        let choice = find(DATASOURCE_OPTION).unwrap();
        let labels = choice.options.as_ref().unwrap();
        assert_eq!(labels.get("fourchan").map(String::as_str), Some("4chan"));
        assert_eq!(labels.get("news2023").map(String::as_str), Some("news2023"));

        let meta = find("fourchan_metadata").unwrap();
        assert_eq!(meta.requires.as_deref(), Some("webjutter_datasource==fourchan"));
        assert!(meta.help.contains("1,234,567"));
        assert!(meta.help.contains("board_mu"));

        assert!(find("fourchan_query_fields").is_some());
        // description already lists search fields
        assert!(find("news2023_query_fields").is_none());

        let board = find("board").unwrap();
        let boards = board.options.as_ref().unwrap();
        assert!(boards.contains_key("mu") && boards.contains_key("g"));

        assert_eq!(opts.last().unwrap().key, "query");
        assert_eq!(opts.last().unwrap().kind, OptionKind::TextLarge);
    }

    #[test]
    fn metadata_table_flattens_and_escapes() {
        let html = metadata_table(
            Some(&json!({"lang": {"en": 1000, "nl": "<few>"}, "source": "rss"})),
            "Metadata",
            None,
        );
        assert!(html.contains("<td>lang_en</td>"));
        assert!(html.contains("<td>1,000</td>"));
        assert!(html.contains("&lt;few&gt;"));
        assert!(html.contains("font-weight: bold;\">Metadata</th>"));
    }

    #[test]
    fn metadata_table_empty() {
        assert_eq!(metadata_table(None, "Metadata", None), "No data available");
        assert_eq!(
            metadata_table(Some(&json!({})), "Search fields", None),
            "No data available"
        );
    }

    #[test]
    fn serializes_with_type_key() {
        let v = serde_json::to_value(&settings_schema()[2]).unwrap();
        assert_eq!(v["type"], json!("text"));
        assert_eq!(v["sensitive"], json!(true));
        let v = serde_json::to_value(&settings_schema()[0]).unwrap();
        assert!(v.get("sensitive").is_none());
    }
}
