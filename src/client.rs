//! HTTP client for the Webjutter API.
//!
//! # Endpoints
//!
//! | Method | Path | Used for |
//! |--------|------|----------|
//! | `HEAD` | `/api/overview` | connectivity and credential probe |
//! | `GET`  | `/api/overview` | collection overview document |
//! | `POST` | `/api/{collection}/search/` | paginated search (`q`, `size`, `search_after`) |
//!
//! Every request carries HTTP basic auth and the configured timeout. There
//! are no retries here: callers decide what a failure means.
//!
//! # Status mapping
//!
//! - 401 / 403 → [`BridgeError::AuthenticationFailed`]
//! - 429 / 5xx / transport errors / timeouts → [`BridgeError::RemoteUnavailable`]
//! - other 4xx with a JSON `message` → [`BridgeError::MalformedQuery`]
//! - 404 without a message → [`BridgeError::CollectionUnknown`]

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::error::{BridgeError, Result};
use crate::overview::CollectionOverview;

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub results: Vec<Map<String, Value>>,
    pub total: Option<u64>,
    /// Cursor for the next page; `None` when this is the last one.
    pub search_after: Option<Value>,
}

#[derive(Deserialize)]
struct RawSearchPage {
    results: Vec<Map<String, Value>>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    search_after: Option<Value>,
}

/// Overview as received: parsed for validation, raw bytes kept for storage.
#[derive(Debug, Clone)]
pub struct FetchedOverview {
    pub overview: CollectionOverview,
    pub raw: Vec<u8>,
}

/// Thin wrapper around a `reqwest::Client` bound to one Webjutter instance.
#[derive(Debug, Clone)]
pub struct WebjutterClient {
    http: reqwest::Client,
    conn: ConnectionConfig,
}

impl WebjutterClient {
    pub fn new(conn: ConnectionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(conn.timeout)
            .user_agent(concat!("webjutter-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::RemoteUnavailable(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self { http, conn })
    }

    pub fn connection(&self) -> &ConnectionConfig {
        &self.conn
    }

    /// Lightweight reachability and credential check.
    pub async fn probe(&self) -> Result<()> {
        let resp = self
            .http
            .head(self.conn.endpoint("api/overview"))
            .basic_auth(&self.conn.user, Some(&self.conn.password))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BridgeError::AuthenticationFailed {
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(BridgeError::RemoteUnavailable(format!(
                "probe returned HTTP {}",
                status
            )));
        }
        Ok(())
    }

    /// Fetch and validate the collection overview.
    pub async fn fetch_overview(&self) -> Result<FetchedOverview> {
        let resp = self
            .http
            .get(self.conn.endpoint("api/overview"))
            .basic_auth(&self.conn.user, Some(&self.conn.password))
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BridgeError::AuthenticationFailed {
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            return Err(BridgeError::RemoteUnavailable(format!(
                "overview returned HTTP {}",
                status
            )));
        }

        let raw = resp.bytes().await?.to_vec();
        let overview = CollectionOverview::from_slice(&raw).map_err(|e| {
            BridgeError::RemoteUnavailable(format!("overview payload is not usable: {}", e))
        })?;
        Ok(FetchedOverview { overview, raw })
    }

    /// Request one page of results for `query` from `collection`.
    ///
    /// `size` limits the page length (`Some(0)` only counts hits).
    /// `timeout` overrides the configured per-call timeout.
    pub async fn search_page(
        &self,
        collection: &str,
        query: &str,
        search_after: Option<&Value>,
        size: Option<u64>,
        timeout: Option<Duration>,
    ) -> Result<SearchPage> {
        let url = self
            .conn
            .endpoint(&format!("api/{}/search/", collection.trim()));

        let mut params: Vec<(&str, String)> = vec![("q", query.to_string())];
        if let Some(size) = size {
            params.push(("size", size.to_string()));
        }
        if let Some(cursor) = search_after {
            params.extend(cursor_params(cursor));
        }

        let mut req = self
            .http
            .post(&url)
            .query(&params)
            .basic_auth(&self.conn.user, Some(&self.conn.password));
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &body, collection));
        }

        let bytes = resp.bytes().await?;
        parse_search_page(&bytes)
    }
}

/// Encode a cursor as `search_after` query parameters.
///
/// Array cursors become one parameter per element, matching how the
/// remote reads repeated keys.
fn cursor_params(cursor: &Value) -> Vec<(&'static str, String)> {
    match cursor {
        Value::Array(values) => values
            .iter()
            .map(|v| ("search_after", scalar_to_string(v)))
            .collect(),
        other => vec![("search_after", scalar_to_string(other))],
    }
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a search response body.
///
/// Anything that is not an object with a `results` array of objects is a
/// malformed response.
pub fn parse_search_page(bytes: &[u8]) -> Result<SearchPage> {
    let raw: RawSearchPage = serde_json::from_slice(bytes).map_err(|e| {
        BridgeError::MalformedQuery(format!("Webjutter returned an invalid response: {}", e))
    })?;

    let search_after = match raw.search_after {
        None | Some(Value::Null) => None,
        Some(Value::Array(a)) if a.is_empty() => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v),
    };

    Ok(SearchPage {
        results: raw.results,
        total: raw.total,
        search_after,
    })
}

/// Map a non-success search status onto the error taxonomy.
pub fn classify_error(status: StatusCode, body: &str, collection: &str) -> BridgeError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return BridgeError::AuthenticationFailed {
            status: status.as_u16(),
        };
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return BridgeError::RemoteUnavailable("rate limited by Webjutter".to_string());
    }
    if status.is_server_error() {
        return BridgeError::RemoteUnavailable(format!("Webjutter returned HTTP {}", status));
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));

    match message {
        Some(msg) => BridgeError::MalformedQuery(msg),
        None if status == StatusCode::NOT_FOUND => {
            BridgeError::CollectionUnknown(collection.to_string())
        }
        None => {
            let body = body.trim();
            if body.is_empty() {
                BridgeError::MalformedQuery(format!("Webjutter returned HTTP {}", status))
            } else {
                BridgeError::MalformedQuery(format!("HTTP {}: {}", status, body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_page_with_cursor() {
        let page = parse_search_page(
            br#"{"results": [{"id": 1}, {"id": 2}], "total": 7, "search_after": [1690000000, "abc"]}"#,
        )
        .unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.total, Some(7));
        assert_eq!(page.search_after, Some(json!([1690000000, "abc"])));
    }

    #[test]
    fn empty_cursor_means_last_page() {
        let page = parse_search_page(br#"{"results": [], "search_after": []}"#).unwrap();
        assert!(page.search_after.is_none());
        let page = parse_search_page(br#"{"results": [{}], "search_after": null}"#).unwrap();
        assert!(page.search_after.is_none());
    }

    #[test]
    fn malformed_bodies_are_malformed_query() {
        let bodies: [&[u8]; 6] = [
            b"<html>oops</html>",
            br#"{"total": 3}"#,
            br#"{"results": "nope"}"#,
            br#"{"results": [1, 2]}"#,
            br#"[]"#,
            b"",
        ];
        for body in bodies {
            match parse_search_page(body) {
                Err(BridgeError::MalformedQuery(_)) => {}
                other => panic!("expected MalformedQuery for {:?}, got {:?}", body, other),
            }
        }
    }

    #[test]
    fn status_classification() {
        assert_eq!(
            classify_error(StatusCode::UNAUTHORIZED, "", "c"),
            BridgeError::AuthenticationFailed { status: 401 }
        );
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, "", "c"),
            BridgeError::RemoteUnavailable(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, "{\"message\": \"x\"}", "c"),
            BridgeError::RemoteUnavailable(_)
        ));
        assert_eq!(
            classify_error(
                StatusCode::BAD_REQUEST,
                r#"{"message": "Failed to parse query [body:(]"}"#,
                "c"
            ),
            BridgeError::MalformedQuery("Failed to parse query [body:(]".to_string())
        );
        assert_eq!(
            classify_error(StatusCode::NOT_FOUND, "Not Found", "gone"),
            BridgeError::CollectionUnknown("gone".to_string())
        );
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, "bad", "c"),
            BridgeError::MalformedQuery(m) if m.contains("bad")
        ));
    }

    #[test]
    fn array_cursor_becomes_repeated_params() {
        let params = cursor_params(&json!([1690000000, "abc"]));
        assert_eq!(
            params,
            vec![
                ("search_after", "1690000000".to_string()),
                ("search_after", "abc".to_string())
            ]
        );
        assert_eq!(
            cursor_params(&json!("tok")),
            vec![("search_after", "tok".to_string())]
        );
    }
}
