//! Mock fetcher for testing.
//!
//! Serves canned bytes and scripted failures, and records every call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::{FetchedDocument, Fetcher};
use crate::types::document::SourceIdentifier;

#[derive(Debug, Clone)]
enum Script {
    Document(Vec<u8>),
    Permanent(String),
}

/// Mock fetcher.
///
/// Unknown identifiers fail permanently, like a 404.
///
/// # Example
///
/// ```rust
/// use docket::fetchers::MockFetcher;
///
/// let fetcher = MockFetcher::new()
///     .with_document("doc-1", b"hello".to_vec())
///     .with_transient_failures("doc-1", 2);
/// assert_eq!(fetcher.total_fetches(), 0);
/// ```
#[derive(Default)]
pub struct MockFetcher {
    scripts: RwLock<HashMap<String, Script>>,
    transient_remaining: RwLock<HashMap<String, u32>>,
    calls: RwLock<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `source`.
    pub fn with_document(self, source: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.set_document(source, bytes);
        self
    }

    /// Always fail `source` permanently.
    pub fn with_permanent_failure(self, source: &str) -> Self {
        self.scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.to_string(), Script::Permanent("HTTP 404".to_string()));
        self
    }

    /// Fail `source` transiently for its next `failures` fetches.
    pub fn with_transient_failures(self, source: &str, failures: u32) -> Self {
        self.transient_remaining
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.to_string(), failures);
        self
    }

    /// Replace the bytes served for `source` (simulates a changed origin).
    pub fn set_document(&self, source: &str, bytes: impl Into<Vec<u8>>) {
        self.scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.to_string(), Script::Document(bytes.into()));
    }

    /// Number of fetch calls made for `source`.
    pub fn fetch_count(&self, source: &str) -> usize {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, source: &SourceIdentifier) -> FetchResult<FetchedDocument> {
        let key = source.as_str();
        *self
            .calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_insert(0) += 1;

        {
            let mut remaining = self
                .transient_remaining
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(n) = remaining.get_mut(key) {
                if *n > 0 {
                    *n -= 1;
                    return Err(FetchError::transient(key, "connection reset"));
                }
            }
        }

        let script = self
            .scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        match script {
            Some(Script::Document(bytes)) => Ok(FetchedDocument::new(bytes)),
            Some(Script::Permanent(reason)) => Err(FetchError::permanent(key, reason)),
            None => Err(FetchError::permanent(key, "HTTP 404")),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
