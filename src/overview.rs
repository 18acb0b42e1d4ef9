//! Collection overview: the document returned by `GET api/overview` and the
//! single file it is persisted to.
//!
//! The file is always either the last successfully fetched payload or
//! absent. Writes go to a temporary file in the same directory which is then
//! renamed over the target, so readers never see a partial document.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{BridgeError, Result};

/// Parsed overview document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CollectionOverview {
    #[serde(deserialize_with = "lenient_collections")]
    pub collections: BTreeMap<String, CollectionInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the remote reports about one collection.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct CollectionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_fields: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic: Option<ElasticStats>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ElasticStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_records: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_until: Option<Value>,
}

impl CollectionOverview {
    /// Parse raw bytes. The payload must be a JSON object with a
    /// `collections` object.
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn contains(&self, collection: &str) -> bool {
        self.collections.contains_key(collection)
    }

    pub fn get(&self, collection: &str) -> Option<&CollectionInfo> {
        self.collections.get(collection)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

/// One odd entry must not make the whole overview unusable, so entries are
/// read field by field instead of strictly.
fn lenient_collections<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, CollectionInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Map::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(id, value)| (id, CollectionInfo::from_value(value)))
        .collect())
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl CollectionInfo {
    /// Build from whatever the remote sent. Non-object entries yield an
    /// empty info; mistyped fields are dropped.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };
        let mut take = |key: &str| map.remove(key).filter(|v| !v.is_null());

        let name = take("name").and_then(text);
        let description = take("description").and_then(text);
        let metadata = take("metadata");
        let fields = take("fields");
        let search_fields = take("search_fields");
        let elastic = take("elastic").and_then(|v| serde_json::from_value(v).ok());

        Self {
            name,
            description,
            metadata,
            fields,
            search_fields,
            elastic,
            extra: map,
        }
    }

    /// Display name, falling back to the collection id.
    pub fn label<'a>(&'a self, id: &'a str) -> &'a str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(id)
    }

    /// Searchable field schema, whichever key the remote used for it.
    pub fn field_schema(&self) -> Option<&Value> {
        self.fields.as_ref().or(self.search_fields.as_ref())
    }
}

/// File-backed store for the last fetched overview.
#[derive(Debug, Clone)]
pub struct OverviewStore {
    path: PathBuf,
}

impl OverviewStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load the stored overview. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<CollectionOverview>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BridgeError::OverviewUnreadable(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        CollectionOverview::from_slice(&bytes)
            .map(Some)
            .map_err(|e| BridgeError::OverviewUnreadable(format!("{}: {}", self.path.display(), e)))
    }

    /// Atomically replace the stored overview with `payload`.
    ///
    /// The bytes are written as given; callers validate them first.
    pub fn replace(&self, payload: &[u8]) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(payload)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Time since the file was last replaced.
    pub fn age(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }

    /// `Err(StaleOverview)` when the stored file is older than `max_age`.
    ///
    /// Informational only: a stale overview is still used.
    pub fn check_freshness(&self, max_age: Duration) -> Result<()> {
        match self.age() {
            Some(age) if age > max_age => Err(BridgeError::StaleOverview {
                age_secs: age.as_secs(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "collections": {
            "news2023": {
                "name": "News 2023",
                "description": "Articles",
                "fields": {"title": "text", "timestamp": "date"},
                "elastic": {"total_records": 1200, "up_until": "2023-12-31"}
            },
            "fourchan": {"metadata": {"board": {"mu": 10, "pol": 20}}, "owner": "oilab"}
        },
        "version": 2
    }"#;

    #[test]
    fn parses_overview_and_keeps_unknown_keys() {
        let ov = CollectionOverview::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(ov.len(), 2);
        assert!(ov.contains("news2023"));
        assert_eq!(ov.extra.get("version"), Some(&json!(2)));

        let news = ov.get("news2023").unwrap();
        assert_eq!(news.label("news2023"), "News 2023");
        assert_eq!(
            news.elastic.as_ref().unwrap().total_records,
            Some(json!(1200))
        );

        let chan = ov.get("fourchan").unwrap();
        assert_eq!(chan.label("fourchan"), "fourchan");
        assert_eq!(chan.extra.get("owner"), Some(&json!("oilab")));
    }

    #[test]
    fn rejects_payload_without_collections() {
        assert!(CollectionOverview::from_slice(b"{\"status\": \"ok\"}").is_err());
        assert!(CollectionOverview::from_slice(b"[]").is_err());
        assert!(CollectionOverview::from_slice(b"not json").is_err());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        let store = OverviewStore::new(tmp.path().join("nope.json"));
        assert!(store.load().unwrap().is_none());
        assert!(store.age().is_none());
        assert!(store.check_freshness(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn replace_creates_parent_dirs_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = OverviewStore::new(tmp.path().join("config/extensions/ov.json"));

        store.replace(SAMPLE.as_bytes()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().len(), 2);

        store
            .replace(br#"{"collections": {"only": {}}}"#)
            .unwrap();
        let ov = store.load().unwrap().unwrap();
        assert_eq!(ov.ids().collect::<Vec<_>>(), vec!["only"]);

        // No temp files left next to the target
        let siblings = std::fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(siblings, 1);
    }

    #[test]
    fn unreadable_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ov.json");
        std::fs::write(&path, "{ broken").unwrap();
        let store = OverviewStore::new(&path);
        match store.load() {
            Err(BridgeError::OverviewUnreadable(_)) => {}
            other => panic!("expected OverviewUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn odd_entries_do_not_reject_the_overview() {
        let ov = CollectionOverview::from_slice(
            br#"{"collections": {
                "tg": {"name": 5, "description": ["x"], "elastic": "n/a"},
                "odd": "not an object",
                "ok": {"name": "OK", "elastic": {"total_records": 3}}
            }}"#,
        )
        .unwrap();
        assert_eq!(ov.len(), 3);

        let tg = ov.get("tg").unwrap();
        assert_eq!(tg.label("tg"), "5");
        assert!(tg.description.is_none());
        assert!(tg.elastic.is_none());

        assert_eq!(ov.get("odd").unwrap().label("odd"), "odd");
        assert_eq!(
            ov.get("ok").unwrap().elastic.as_ref().unwrap().total_records,
            Some(json!(3))
        );
    }

    #[test]
    fn old_file_is_stale() {
        let tmp = TempDir::new().unwrap();
        let store = OverviewStore::new(tmp.path().join("ov.json"));
        store.replace(SAMPLE.as_bytes()).unwrap();

        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(store.path())
            .unwrap()
            .set_modified(an_hour_ago)
            .unwrap();

        match store.check_freshness(Duration::from_secs(600)) {
            Err(BridgeError::StaleOverview { age_secs }) => assert!(age_secs >= 3600),
            other => panic!("expected StaleOverview, got {:?}", other),
        }
        // Still loadable.
        assert_eq!(store.load().unwrap().unwrap().len(), 2);
    }

    #[test]
    fn fresh_file_is_not_stale() {
        let tmp = TempDir::new().unwrap();
        let store = OverviewStore::new(tmp.path().join("ov.json"));
        store.replace(SAMPLE.as_bytes()).unwrap();
        assert!(store.check_freshness(Duration::from_secs(3600)).is_ok());
    }
}
