//! In-process mock of the Webjutter API for integration tests.
//!
//! Responses are queued per endpoint and served in order. Once a queue is
//! empty the endpoint answers 500. `HEAD /api/overview` never consumes the
//! overview queue.

#![allow(dead_code)]

use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use webjutter_bridge::config::Config;

/// `Basic base64("wj:secret")`.
const EXPECTED_AUTH: &str = "Basic d2o6c2VjcmV0";

#[derive(Default)]
struct MockState {
    overview: Mutex<VecDeque<(u16, String)>>,
    search: Mutex<VecDeque<(u16, String)>>,
    search_queries: Mutex<Vec<(String, String)>>,
    head_status: AtomicU16,
    overview_delay_ms: AtomicU64,
    hits: AtomicUsize,
}

pub struct MockWebjutter {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockWebjutter {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        state.head_status.store(200, Ordering::SeqCst);

        let app = Router::new()
            .route("/api/overview", get(overview))
            .route("/api/{collection}/search/", post(search))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn push_overview(&self, status: u16, body: &str) {
        self.state
            .overview
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    pub fn push_search(&self, status: u16, body: &str) {
        self.state
            .search
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    pub fn set_head_status(&self, status: u16) {
        self.state.head_status.store(status, Ordering::SeqCst);
    }

    pub fn set_overview_delay(&self, delay: Duration) {
        self.state
            .overview_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Total requests received, authenticated or not.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// `(collection, raw query string)` of every search request, in order.
    pub fn search_queries(&self) -> Vec<(String, String)> {
        self.state.search_queries.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == EXPECTED_AUTH)
        .unwrap_or(false)
}

fn json_response(status: u16, body: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn overview(
    State(state): State<Arc<MockState>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return json_response(401, r#"{"message": "unauthorized"}"#.to_string());
    }

    if method == Method::HEAD {
        return json_response(state.head_status.load(Ordering::SeqCst), String::new());
    }

    let delay = state.overview_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let next = state.overview.lock().unwrap().pop_front();
    match next {
        Some((status, body)) => json_response(status, body),
        None => json_response(500, r#"{"message": "no overview queued"}"#.to_string()),
    }
}

async fn search(
    State(state): State<Arc<MockState>>,
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return json_response(401, r#"{"message": "unauthorized"}"#.to_string());
    }

    state
        .search_queries
        .lock()
        .unwrap()
        .push((collection, query.unwrap_or_default()));

    let next = state.search.lock().unwrap().pop_front();
    match next {
        Some((status, body)) => json_response(status, body),
        None => json_response(500, r#"{"message": "no search response queued"}"#.to_string()),
    }
}

/// Config pointing at `url` with the given password, rooted in `root`.
pub fn config_for(url: &str, password: &str, root: &TempDir) -> Config {
    let toml = format!(
        r#"
[webjutter]
url = "{}"
user = "wj"
password = "{}"
timeout_secs = 5

[paths]
root = "{}"

[search]
page_delay_ms = 0
confirm_threshold = 100
"#,
        url,
        password,
        root.path().display()
    );
    toml::from_str(&toml).unwrap()
}

pub const OVERVIEW: &str = r#"{
  "collections": {
    "news2023": {"name": "News 2023", "elastic": {"total_records": 1200, "up_until": "2023-12-31"}},
    "fourchan": {"name": "4chan", "description": "Imageboard archive"}
  }
}"#;

pub const OVERVIEW_V2: &str = r#"{
  "collections": {
    "news2023": {"name": "News 2023"},
    "fourchan": {"name": "4chan"},
    "telegram": {"name": "Telegram"}
  }
}"#;

/// One search page of `ids`, with a cursor unless it is the last page.
pub fn page(ids: &[u64], total: u64, last: bool) -> String {
    let results: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "body": format!("item {}", id)}))
        .collect();
    let cursor = if last {
        serde_json::Value::Null
    } else {
        serde_json::json!([ids.last().copied().unwrap_or(0), "x"])
    };
    serde_json::json!({"results": results, "total": total, "search_after": cursor}).to_string()
}
