//! Source text served from ingested documents.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::hashing::ContentHasher;
use crate::traits::metadata::MetadataStore;
use crate::traits::storage::StorageBackend;
use crate::traits::text::{SourceTextProvider, TextExtractor};
use crate::types::document::{ContentHash, SourceIdentifier};
use crate::types::text::ExtractedText;

/// Looks up a source's record, reads its stored bytes, checks them against
/// the recorded hash and extracts text.
///
/// Extractions are cached by content hash, so deduplicated sources share one
/// entry. Any failure yields `None`, which the verifier treats as
/// unverifiable; corrupt bytes are never used as evidence.
pub struct StoredTextProvider<E> {
    storage: Arc<dyn StorageBackend>,
    metadata: Arc<dyn MetadataStore>,
    extractor: E,
    cache: RwLock<HashMap<ContentHash, Arc<ExtractedText>>>,
}

impl<E: TextExtractor> StoredTextProvider<E> {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        metadata: Arc<dyn MetadataStore>,
        extractor: E,
    ) -> Self {
        Self {
            storage,
            metadata,
            extractor,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn load(&self, source: &SourceIdentifier) -> Option<Arc<ExtractedText>> {
        let record = match self.metadata.get(source).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(source_identifier = %source, "no download record");
                return None;
            }
            Err(e) => {
                warn!(source_identifier = %source, error = %e, "metadata lookup failed");
                return None;
            }
        };

        if let Some(text) = self.cache.read().await.get(&record.content_hash) {
            return Some(text.clone());
        }

        let bytes = match self.storage.read(&record.storage_key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    source_identifier = %source,
                    storage_key = %record.storage_key,
                    error = %e,
                    "stored bytes unavailable"
                );
                return None;
            }
        };

        if let Err(e) = ContentHasher::verify(&record.storage_key, &bytes, &record.content_hash) {
            error!(
                source_identifier = %source,
                error = %e,
                "refusing to extract corrupt bytes"
            );
            return None;
        }

        let text = self.extractor.extract(&bytes);
        if text.is_empty() {
            warn!(source_identifier = %source, "extraction produced no text");
            return None;
        }

        let text = Arc::new(text);
        self.cache
            .write()
            .await
            .insert(record.content_hash, text.clone());
        Some(text)
    }
}

#[async_trait]
impl<E: TextExtractor> SourceTextProvider for StoredTextProvider<E> {
    async fn source_text(&self, source: &SourceIdentifier) -> Option<ExtractedText> {
        self.load(source).await.map(|text| (*text).clone())
    }
}
