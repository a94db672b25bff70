//! Discovery collaborator interface.

use async_trait::async_trait;

use crate::error::DiscoveryError;
use crate::types::document::DiscoveredDocument;

/// Yields the documents a run should consider.
///
/// The pipeline does not validate discovery output; it only consumes it.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self) -> Result<Vec<DiscoveredDocument>, DiscoveryError>;
}
