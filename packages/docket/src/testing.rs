//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the pipeline without network access or a
//! real analysis model.

use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::extractors::{PlainTextExtractor, StoredTextProvider};
use crate::fetchers::MockFetcher;
use crate::pipeline::batch::BatchRunner;
use crate::pipeline::retry::RetryPolicy;
use crate::storage::MemoryStorage;
use crate::stores::MemoryMetadataStore;
use crate::traits::{analyzer::Analyzer, text::SourceTextProvider};
use crate::types::citation::Citation;
use crate::types::document::{DiscoveredDocument, SourceIdentifier};
use crate::types::outcome::BatchOutcome;
use crate::types::text::ExtractedText;

/// A mock analyzer returning canned claims per source.
#[derive(Default)]
pub struct MockAnalyzer {
    /// (claim text, quoted span) pairs by source identifier
    claims: RwLock<HashMap<String, Vec<(String, String)>>>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a claim the analyzer will propose for `source`.
    pub fn with_claim(
        self,
        source: &str,
        claim_text: impl Into<String>,
        quoted_span: impl Into<String>,
    ) -> Self {
        self.claims
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(source.to_string())
            .or_default()
            .push((claim_text.into(), quoted_span.into()));
        self
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    type Error = Infallible;

    async fn analyze(
        &self,
        source: &SourceIdentifier,
        _text: &ExtractedText,
    ) -> Result<Vec<Citation>, Self::Error> {
        let claims = self
            .claims
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source.as_str())
            .cloned()
            .unwrap_or_default();

        Ok(claims
            .into_iter()
            .map(|(claim, quote)| Citation::pending(claim, quote, source.clone()))
            .collect())
    }
}

/// Source text held in memory, with lookup counting.
#[derive(Default)]
pub struct StaticTextProvider {
    texts: HashMap<String, ExtractedText>,
    lookups: RwLock<HashMap<String, usize>>,
}

impl StaticTextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, source: &str, text: ExtractedText) -> Self {
        self.texts.insert(source.to_string(), text);
        self
    }

    /// Number of `source_text` calls for `source`.
    pub fn lookups(&self, source: &str) -> usize {
        self.lookups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl SourceTextProvider for StaticTextProvider {
    async fn source_text(&self, source: &SourceIdentifier) -> Option<ExtractedText> {
        *self
            .lookups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(source.as_str().to_string())
            .or_insert(0) += 1;
        self.texts.get(source.as_str()).cloned()
    }
}

/// In-memory pipeline: memory storage, memory metadata and a mock fetcher.
///
/// # Example
///
/// ```rust,ignore
/// use docket::testing::{doc, TestPipeline};
/// use docket::fetchers::MockFetcher;
///
/// let pipeline = TestPipeline::new(MockFetcher::new().with_document("a", "bytes"));
/// let outcome = pipeline.run(vec![doc("a")]).await;
/// assert!(outcome.is_success());
/// ```
pub struct TestPipeline {
    pub storage: Arc<MemoryStorage>,
    pub metadata: Arc<MemoryMetadataStore>,
    pub fetcher: Arc<MockFetcher>,
    pub config: PipelineConfig,
}

impl TestPipeline {
    /// Retries without delay so tests stay fast.
    pub fn new(fetcher: MockFetcher) -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
            fetcher: Arc::new(fetcher),
            config: PipelineConfig::default().with_retry(RetryPolicy::immediate(3)),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn runner(&self) -> BatchRunner {
        BatchRunner::new(
            self.storage.clone(),
            self.metadata.clone(),
            self.fetcher.clone(),
            &self.config,
        )
    }

    pub async fn run(&self, documents: Vec<DiscoveredDocument>) -> BatchOutcome {
        self.runner()
            .run_documents(documents, CancellationToken::new())
            .await
    }

    /// Text provider over this pipeline's stores.
    pub fn text_provider(&self) -> StoredTextProvider<PlainTextExtractor> {
        StoredTextProvider::new(
            self.storage.clone(),
            self.metadata.clone(),
            PlainTextExtractor,
        )
    }
}

/// A discovered document whose title is its identifier.
///
/// # Panics
///
/// Panics on a blank identifier.
pub fn doc(id: &str) -> DiscoveredDocument {
    let source = SourceIdentifier::new(id).unwrap_or_else(|| panic!("blank identifier {id:?}"));
    DiscoveredDocument::new(source, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_analyzer_emits_pending_citations() {
        let analyzer = MockAnalyzer::new().with_claim("a", "claim", "quote");
        let citations = analyzer
            .analyze(&SourceIdentifier::new("a").unwrap(), &ExtractedText::new("x"))
            .await
            .unwrap();
        assert_eq!(citations.len(), 1);
        assert!(!citations[0].status().is_terminal());
    }

    #[tokio::test]
    async fn test_pipeline_harness_ingests() {
        let pipeline = TestPipeline::new(MockFetcher::new().with_document("a", b"bytes".to_vec()));
        let outcome = pipeline.run(vec![doc("a")]).await;
        assert!(outcome.is_success());
        assert_eq!(pipeline.metadata.len(), 1);
    }
}
