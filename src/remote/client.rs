use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use tracing::{debug, instrument};

use crate::error::{AppError, Result};
use crate::remote::sse::SseDecoder;
use crate::remote::types::{FilePreview, PageRequest, ProjectSummary, TreePage};

/// Header carrying the API token on every REST call.
const TOKEN_HEADER: &str = "x-token";

/// Read side of the document server used by the tree explorer.
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Fetch one page of a directory listing or of a flat search.
    async fn fetch_tree_page(&self, project_id: &str, request: &PageRequest) -> Result<TreePage>;

    /// Fetch the read-only preview of a file.
    async fn fetch_file_preview(&self, file_id: &str) -> Result<FilePreview>;

    /// Fetch the project summary (README location, counts).
    async fn fetch_project_summary(&self, project_id: &str) -> Result<ProjectSummary>;
}

/// Opens the server push channel for one project.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, project_id: &str) -> Result<Box<dyn EventFeed>>;
}

/// An open event stream yielding raw event payloads.
#[async_trait]
pub trait EventFeed: Send {
    /// Next raw payload; `None` once the server closed the stream.
    async fn next_message(&mut self) -> Option<Result<String>>;
}

/// HTTP client for the document server's REST API and event stream.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    /// Event streams stay open indefinitely, so they get a client without a
    /// request timeout.
    stream_http: reqwest::Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8081/api`).
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("invalid server url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "server url '{}' cannot carry a path",
                base_url
            )));
        }
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(token)
            .map_err(|e| AppError::Config(format!("invalid token: {}", e)))?;
        headers.insert(TOKEN_HEADER, value);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .default_headers(headers.clone())
            .build()?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            stream_http,
            base_url,
            token: token.to_string(),
        })
    }

    /// Build `{base}/seg1/seg2/...` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("server url '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>> {
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl TreeSource for ApiClient {
    #[instrument(name = "fetch_tree_page", skip(self))]
    async fn fetch_tree_page(&self, project_id: &str, request: &PageRequest) -> Result<TreePage> {
        let mut url = self.endpoint(&["projects", project_id, "tree"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(parent) = &request.parent {
                query.append_pair("path", parent);
            }
            if let Some(cursor) = &request.cursor {
                query.append_pair("cursor", cursor);
            }
            if let Some(q) = &request.query {
                query.append_pair("q", q);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        let body = self.get_bytes(url).await?;
        let page = TreePage::from_json(&body)?;
        debug!(items = page.items.len(), more = page.next_cursor.is_some(), "tree page");
        Ok(page)
    }

    #[instrument(name = "fetch_file_preview", skip(self))]
    async fn fetch_file_preview(&self, file_id: &str) -> Result<FilePreview> {
        let url = self.endpoint(&["files", file_id, "preview"])?;
        let body = self.get_bytes(url).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    #[instrument(name = "fetch_project_summary", skip(self))]
    async fn fetch_project_summary(&self, project_id: &str) -> Result<ProjectSummary> {
        let url = self.endpoint(&["projects", project_id, "modal"])?;
        let body = self.get_bytes(url).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl EventSource for ApiClient {
    async fn open(&self, project_id: &str) -> Result<Box<dyn EventFeed>> {
        let mut url = self.endpoint(&["events", "stream"])?;
        url.query_pairs_mut()
            .append_pair("project_id", project_id)
            .append_pair("token", &self.token);
        let resp = self
            .stream_http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| AppError::Stream(format!("connect failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Stream(format!("rejected: {}", e)))?;
        Ok(Box::new(SseFeed {
            response: resp,
            decoder: SseDecoder::new(),
        }))
    }
}

/// Event feed over a streaming HTTP response.
struct SseFeed {
    response: reqwest::Response,
    decoder: SseDecoder,
}

#[async_trait]
impl EventFeed for SseFeed {
    async fn next_message(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(event) = self.decoder.next_event() {
                return Some(Ok(event));
            }
            match self.response.chunk().await {
                Ok(Some(bytes)) => {
                    if let Err(e) = self.decoder.push(&bytes) {
                        return Some(Err(e));
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some(Err(AppError::Stream(e.to_string()))),
            }
        }
    }
}
