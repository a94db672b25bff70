//! HTTP fetcher for sources identified by URL.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{FetchedDocument, Fetcher};
use crate::types::document::SourceIdentifier;

/// Fetches documents whose source identifier is an `http(s)` URL.
///
/// # Example
///
/// ```rust,ignore
/// use docket::fetchers::HttpFetcher;
///
/// let fetcher = HttpFetcher::new()?.with_user_agent("CivicArchiver/1.0");
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher with a 60 second request timeout.
    pub fn new() -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            user_agent: "DocketBot/1.0".to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Classify a non-success HTTP status.
///
/// Timeouts, throttling and server errors may clear up; other client errors
/// will not.
pub fn classify_status(source: &str, status: StatusCode) -> FetchError {
    let reason = format!("HTTP {}", status);
    match status.as_u16() {
        408 | 425 | 429 => FetchError::transient(source, reason),
        500..=599 => FetchError::transient(source, reason),
        _ => FetchError::permanent(source, reason),
    }
}

/// Classify a failure to get any response at all.
///
/// Timeouts and connection problems are worth retrying. Redirect loops,
/// request-building errors and the rest fail the same way every time.
pub fn classify_send_error(source: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        FetchError::transient(source, error.to_string())
    } else {
        FetchError::permanent(source, error.to_string())
    }
}

fn parse_url(source: &SourceIdentifier) -> FetchResult<Url> {
    let url = Url::parse(source.as_str())
        .map_err(|e| FetchError::permanent(source.as_str(), format!("not a URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::permanent(
            source.as_str(),
            format!("unsupported scheme {}", other),
        )),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceIdentifier) -> FetchResult<FetchedDocument> {
        let url = parse_url(source)?;
        debug!(url = %url, "HTTP fetch starting");

        let response = self
            .client
            .get(url.clone())
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "HTTP request failed");
                classify_send_error(source.as_str(), &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(source.as_str(), status));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::transient(source.as_str(), e.to_string()))?;

        let mut fetched = FetchedDocument::new(bytes.to_vec());
        if let Some(ct) = content_type {
            fetched = fetched.with_content_type(ct);
        }
        debug!(url = %url, size = fetched.bytes.len(), "HTTP fetch complete");
        Ok(fetched)
    }

    fn name(&self) -> &str {
        "http"
    }
}
