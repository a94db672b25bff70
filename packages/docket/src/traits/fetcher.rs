//! Fetching raw document bytes from their origin.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FetchResult;
use crate::types::document::SourceIdentifier;

/// Raw bytes retrieved for one source.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,

    /// MIME type reported by the origin, if any
    pub content_type: Option<String>,

    pub fetched_at: DateTime<Utc>,
}

impl FetchedDocument {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The fetch half of the extraction collaborator.
///
/// Implementations must classify failures: `FetchError::Transient` is retried
/// by the batch runner, `FetchError::Permanent` is not.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &SourceIdentifier) -> FetchResult<FetchedDocument>;

    /// Fetcher name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}
