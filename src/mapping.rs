//! Remote record → host item mapping.
//!
//! Most collections already use field names the host understands, so their
//! records pass through untouched. Imageboard archives (records with a
//! `board` and a post number `no`) are renamed into the host's
//! `id` / `thread_id` / `author` / `body` layout.

use scraper::Html;
use serde_json::{Map, Value};

use crate::models::ResultItem;

/// Imageboard fields copied after the renamed ones, `""` when absent.
const KNOWN_CHAN_FIELDS: &[&str] = &[
    "deleted",
    "timestamp_deleted",
    "replies_to",
    "capcode",
    "trip",
    "filename",
    "tim",
    "ext",
    "md5",
    "w",
    "h",
    "tw",
    "th",
    "fsize",
    "country",
    "country_name",
    "board_flag",
    "flag_name",
    "op",
    "replies",
    "images",
    "semantic_url",
    "sticky",
    "closed",
    "archived_on",
    "scraped_on",
    "modified_on",
    "unique_ips",
    "bumplimit",
    "imagelimit",
];

/// Map one remote record into a [`ResultItem`].
pub fn map_item(record: Map<String, Value>) -> ResultItem {
    if is_chan_record(&record) {
        ResultItem::new(map_chan_record(&record))
    } else {
        ResultItem::new(record)
    }
}

fn is_chan_record(record: &Map<String, Value>) -> bool {
    let has_board = match record.get("board") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };
    has_board && record.contains_key("no")
}

fn map_chan_record(record: &Map<String, Value>) -> Map<String, Value> {
    let field = |key: &str| record.get(key).cloned().unwrap_or_else(|| Value::from(""));

    // Replies point at their thread through `resto`; opening posts have resto 0.
    let thread_id = match record.get("resto") {
        Some(v) if is_truthy(v) => v.clone(),
        _ => field("no"),
    };

    let mut out = Map::new();
    out.insert("board".into(), field("board"));
    out.insert("id".into(), field("no"));
    out.insert("id_in_thread".into(), field("id"));
    out.insert("thread_id".into(), thread_id);
    out.insert("unix_timestamp".into(), field("time"));
    out.insert("etd_timestamp".into(), field("now"));
    out.insert("author".into(), field("name"));
    out.insert("title".into(), Value::from(strip_tags(&text_of(record, "sub"))));
    out.insert("body".into(), Value::from(strip_tags(&text_of(record, "com"))));
    for key in KNOWN_CHAN_FIELDS {
        out.insert((*key).to_string(), field(key));
    }
    out
}

fn text_of(record: &Map<String, Value>, key: &str) -> String {
    match record.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Strip HTML tags, turning line breaks into newlines and decoding entities.
pub fn strip_tags(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return html.to_string();
    }
    let with_newlines = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n");
    let fragment = Html::parse_fragment(&with_newlines);
    fragment.root_element().text().collect::<String>()
}
