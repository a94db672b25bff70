//! LLM analysis collaborator interface.

use async_trait::async_trait;

use crate::types::citation::Citation;
use crate::types::document::SourceIdentifier;
use crate::types::text::ExtractedText;

/// Produces candidate claims from extracted text.
///
/// This is the only producer of citations; every citation it returns must be
/// in the `pending` state.
#[async_trait]
pub trait Analyzer: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn analyze(
        &self,
        source: &SourceIdentifier,
        text: &ExtractedText,
    ) -> Result<Vec<Citation>, Self::Error>;
}
