//! Text extraction and source-text lookup.

use async_trait::async_trait;

use crate::types::document::SourceIdentifier;
use crate::types::text::ExtractedText;

/// Turns fetched bytes into plain text with page locators.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> ExtractedText;
}

/// Supplies the cached extraction output for a source.
///
/// `None` means the text is unavailable; the verifier then classifies the
/// citation as unverifiable.
#[async_trait]
pub trait SourceTextProvider: Send + Sync {
    async fn source_text(&self, source: &SourceIdentifier) -> Option<ExtractedText>;
}
