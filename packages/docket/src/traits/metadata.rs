//! Durable record of every ingested document.

use async_trait::async_trait;

use crate::error::{MetadataError, MetadataResult};
use crate::types::document::{ContentHash, DownloadRecord, SourceIdentifier};

/// Store of [`DownloadRecord`]s keyed by source identifier.
///
/// `put` is an upsert. Writers for the same identifier are serialised by the
/// batch runner's sharding, not by the store.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Look up the record for a source.
    async fn get(&self, source: &SourceIdentifier) -> MetadataResult<Option<DownloadRecord>>;

    /// Insert or update a record.
    ///
    /// Fails with `MetadataError::Conflict` if an existing record would change
    /// its `storage_key` or `content_hash`.
    async fn put(&self, record: &DownloadRecord) -> MetadataResult<()>;

    /// Remove the record for a source. Missing records are ignored.
    async fn delete(&self, source: &SourceIdentifier) -> MetadataResult<()>;

    /// Any record whose bytes hash to `hash` (used for deduplication).
    async fn find_by_content_hash(
        &self,
        hash: &ContentHash,
    ) -> MetadataResult<Option<DownloadRecord>>;

    /// Number of records.
    async fn count(&self) -> MetadataResult<usize>;

    /// All records ordered by source identifier.
    async fn list(&self) -> MetadataResult<Vec<DownloadRecord>>;

    /// Link a downstream entity to an existing record.
    async fn attach_derived_entity(
        &self,
        source: &SourceIdentifier,
        entity_id: &str,
    ) -> MetadataResult<DownloadRecord> {
        let record = self
            .get(source)
            .await?
            .ok_or_else(|| MetadataError::NotFound {
                source_identifier: source.to_string(),
            })?
            .with_derived_entity(entity_id);
        self.put(&record).await?;
        Ok(record)
    }
}

/// Reject upserts that would rewrite immutable fields.
pub fn check_immutable_fields(
    existing: &DownloadRecord,
    incoming: &DownloadRecord,
) -> MetadataResult<()> {
    if existing.storage_key != incoming.storage_key {
        return Err(MetadataError::Conflict {
            source_identifier: existing.source_identifier.to_string(),
            field: "storage_key",
            stored: existing.storage_key.to_string(),
            attempted: incoming.storage_key.to_string(),
        });
    }
    if existing.content_hash != incoming.content_hash {
        return Err(MetadataError::Conflict {
            source_identifier: existing.source_identifier.to_string(),
            field: "content_hash",
            stored: existing.content_hash.to_string(),
            attempted: incoming.content_hash.to_string(),
        });
    }
    Ok(())
}
