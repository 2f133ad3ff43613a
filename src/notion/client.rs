//! Minimal Notion REST client.
//!
//! Only the endpoints the publisher needs: database query (with
//! pagination), page create/update, and block children append (chunked to
//! Notion's 100-blocks-per-request limit). Every request goes through
//! [`Backoff::retry`], so 429s and 5xx answers are retried.

use crate::api::Backoff;
use crate::error::ApiError;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// The part of a Notion page object we read.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub properties: Value,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    backoff: Backoff,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl NotionClient {
    /// Client for the public API with the default [`Backoff`].
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: NOTION_API_BASE.to_string(),
            backoff: Backoff::default(),
        })
    }

    /// Point at another host (a proxy or a local stub).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the retry policy.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send_once(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let mut request = self
            .http
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, path, "Notion request failed");
            return Err(ApiError::from_status(status, text));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        self.backoff
            .retry(path, || self.send_once(method.clone(), path, body))
            .await
    }

    /// Every page in the database matching `filter`, following cursors.
    #[instrument(level = "debug", skip_all, fields(%database_id))]
    pub async fn query_database(&self, database_id: &str, filter: Value) -> Result<Vec<Page>, ApiError> {
        let path = format!("databases/{}/query", database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "filter": filter, "page_size": 100 });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }
            let value = self.send(Method::POST, &path, Some(&body)).await?;
            let response: QueryResponse =
                serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))?;
            pages.extend(response.results);

            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        debug!(count = pages.len(), "Queried database");
        Ok(pages)
    }

    /// Create a page.
    ///
    /// # Arguments
    ///
    /// * `body` - full request body: `parent`, `properties`, optional `cover`
    ///
    /// # Returns
    ///
    /// The created page, whose `id` is the block id for appends.
    pub async fn create_page(&self, body: Value) -> Result<Page, ApiError> {
        let value = self.send(Method::POST, "pages", Some(&body)).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Patch a page's `properties`, `cover`, or `archived` flag.
    ///
    /// # Returns
    ///
    /// The page as Notion reports it after the update.
    pub async fn update_page(&self, page_id: &str, body: Value) -> Result<Page, ApiError> {
        let value = self
            .send(Method::PATCH, &format!("pages/{}", page_id), Some(&body))
            .await?;
        serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Append blocks under `block_id`, at most [`MAX_BLOCKS_PER_REQUEST`]
    /// per call, preserving order.
    #[instrument(level = "debug", skip_all, fields(%block_id, blocks = blocks.len()))]
    pub async fn append_children(&self, block_id: &str, blocks: &[Value]) -> Result<(), ApiError> {
        let path = format!("blocks/{}/children", block_id);
        for chunk in blocks.chunks(MAX_BLOCKS_PER_REQUEST) {
            let body = json!({ "children": chunk });
            self.send(Method::PATCH, &path, Some(&body)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::stub::StubServer;

    #[test]
    fn test_page_deserializes_with_missing_fields() {
        let page: Page = serde_json::from_value(json!({
            "object": "page",
            "id": "59833787-2cf9-4fdf-8782-e53db20768a5",
            "url": "https://www.notion.so/AI-Daily-59833787",
            "properties": { "title": {} }
        }))
        .unwrap();
        assert_eq!(page.id, "59833787-2cf9-4fdf-8782-e53db20768a5");
        assert!(page.properties.get("title").is_some());

        let bare: Page = serde_json::from_value(json!({ "id": "x" })).unwrap();
        assert!(bare.url.is_empty());
        assert!(bare.properties.is_null());
    }

    #[test]
    fn test_query_response_cursor() {
        let r: QueryResponse = serde_json::from_value(json!({
            "object": "list",
            "results": [{ "id": "a" }, { "id": "b" }],
            "has_more": true,
            "next_cursor": "abc"
        }))
        .unwrap();
        assert_eq!(r.results.len(), 2);
        assert!(r.has_more);
        assert_eq!(r.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let client = NotionClient::new("secret")
            .unwrap()
            .with_base_url("http://localhost:9999/v1/");
        assert_eq!(client.base_url, "http://localhost:9999/v1");
    }

    fn stub_client(server: &StubServer) -> NotionClient {
        NotionClient::new("secret")
            .unwrap()
            .with_base_url(&server.base_url)
            .with_backoff(Backoff::new(0, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_append_children_chunks_at_limit() {
        let server = StubServer::start(|_| (200, json!({ "object": "list", "results": [] }))).await;
        let client = stub_client(&server);
        let blocks: Vec<Value> = (0..250).map(|i| json!({ "n": i })).collect();

        client.append_children("page-1", &blocks).await.unwrap();

        let reqs = server.requests();
        let sizes: Vec<usize> = reqs
            .iter()
            .map(|r| r.body["children"].as_array().map_or(0, Vec::len))
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(reqs
            .iter()
            .all(|r| r.method == "PATCH" && r.path == "/v1/blocks/page-1/children"));
        assert_eq!(reqs[1].body["children"][0]["n"], 100);
        assert_eq!(reqs[2].body["children"][49]["n"], 249);
    }

    #[tokio::test]
    async fn test_query_database_follows_cursor() {
        let server = StubServer::start(|req| {
            if req.body.get("start_cursor").is_none() {
                (
                    200,
                    json!({ "results": [{ "id": "a" }], "has_more": true, "next_cursor": "c1" }),
                )
            } else {
                (200, json!({ "results": [{ "id": "b" }], "has_more": false, "next_cursor": null }))
            }
        })
        .await;
        let client = stub_client(&server);

        let pages = client
            .query_database("db", json!({ "property": "date" }))
            .await
            .unwrap();
        let ids: Vec<_> = pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let reqs = server.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].path, "/v1/databases/db/query");
        assert_eq!(reqs[1].body["start_cursor"], "c1");
        assert_eq!(reqs[1].body["filter"], json!({ "property": "date" }));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = StubServer::start(|_| (401, json!({ "code": "unauthorized" }))).await;
        let client = NotionClient::new("secret")
            .unwrap()
            .with_base_url(&server.base_url)
            .with_backoff(Backoff::new(3, Duration::from_millis(1)));

        let err = client.create_page(json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 401, .. }));
        assert_eq!(server.requests().len(), 1);
    }
}
