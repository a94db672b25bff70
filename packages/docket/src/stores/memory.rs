//! In-memory metadata store for testing and development.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{MetadataError, MetadataResult};
use crate::traits::metadata::{check_immutable_fields, MetadataStore};
use crate::types::document::{ContentHash, DownloadRecord, SourceIdentifier};

/// In-memory download records, ordered by source identifier.
///
/// Not suitable for production as data is lost on restart.
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: RwLock<BTreeMap<SourceIdentifier, DownloadRecord>>,
    failing_puts: RwLock<HashSet<SourceIdentifier>>,
    puts: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered copy of every record, for before/after comparisons.
    pub fn snapshot(&self) -> Vec<DownloadRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of successful `put` calls.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Make every `put` for `source` fail with a backend error.
    pub fn fail_puts_for(&self, source: &SourceIdentifier) {
        self.failing_puts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source.clone());
    }

    /// Undo [`fail_puts_for`](Self::fail_puts_for).
    pub fn restore_puts_for(&self, source: &SourceIdentifier) {
        self.failing_puts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source);
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn get(&self, source: &SourceIdentifier) -> MetadataResult<Option<DownloadRecord>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned())
    }

    async fn put(&self, record: &DownloadRecord) -> MetadataResult<()> {
        if self
            .failing_puts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&record.source_identifier)
        {
            return Err(MetadataError::Backend("injected put failure".into()));
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);

        let merged = match records.get(&record.source_identifier) {
            Some(existing) => {
                check_immutable_fields(existing, record)?;
                DownloadRecord {
                    derived_entity_id: record.derived_entity_id.clone(),
                    display_title: record.display_title.clone(),
                    declared_date: record.declared_date,
                    ..existing.clone()
                }
            }
            None => record.clone(),
        };

        records.insert(record.source_identifier.clone(), merged);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, source: &SourceIdentifier) -> MetadataResult<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(source);
        Ok(())
    }

    async fn find_by_content_hash(
        &self,
        hash: &ContentHash,
    ) -> MetadataResult<Option<DownloadRecord>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|r| &r.content_hash == hash)
            .cloned())
    }

    async fn count(&self) -> MetadataResult<usize> {
        Ok(self.len())
    }

    async fn list(&self) -> MetadataResult<Vec<DownloadRecord>> {
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetadataError;
    use crate::hashing::ContentHasher;
    use crate::types::document::StorageKey;

    fn record(id: &str, bytes: &[u8]) -> DownloadRecord {
        let id = SourceIdentifier::new(id).unwrap();
        let key = StorageKey::for_source(&id);
        DownloadRecord::new(id, key, ContentHasher::hash(bytes), bytes.len() as u64)
    }

    #[tokio::test]
    async fn test_record_crud() {
        let store = MemoryMetadataStore::new();
        let r = record("doc-1", b"hello");

        store.put(&r).await.unwrap();
        assert_eq!(store.get(&r.source_identifier).await.unwrap(), Some(r.clone()));
        assert_eq!(store.count().await.unwrap(), 1);

        store.delete(&r.source_identifier).await.unwrap();
        assert!(store.get(&r.source_identifier).await.unwrap().is_none());
        store.delete(&r.source_identifier).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_rejects_changed_content_hash() {
        let store = MemoryMetadataStore::new();
        let original = record("doc-1", b"hello");
        store.put(&original).await.unwrap();

        let mut changed = original.clone();
        changed.content_hash = ContentHasher::hash(b"other");

        let err = store.put(&changed).await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Conflict {
                field: "content_hash",
                ..
            }
        ));
        assert_eq!(store.get(&original.source_identifier).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_upsert_keeps_capture_fields() {
        let store = MemoryMetadataStore::new();
        let original = record("doc-1", b"hello");
        store.put(&original).await.unwrap();

        let mut update = original.clone().with_derived_entity("session-7");
        update.captured_at = chrono::Utc::now() + chrono::Duration::days(1);
        store.put(&update).await.unwrap();

        let stored = store.get(&original.source_identifier).await.unwrap().unwrap();
        assert_eq!(stored.captured_at, original.captured_at);
        assert_eq!(stored.derived_entity_id.as_deref(), Some("session-7"));
    }

    #[tokio::test]
    async fn test_attach_derived_entity() {
        let store = MemoryMetadataStore::new();
        let r = record("doc-1", b"hello");
        store.put(&r).await.unwrap();

        let updated = store
            .attach_derived_entity(&r.source_identifier, "session-1")
            .await
            .unwrap();
        assert_eq!(updated.derived_entity_id.as_deref(), Some("session-1"));

        let missing = SourceIdentifier::new("nope").unwrap();
        assert!(matches!(
            store.attach_derived_entity(&missing, "x").await,
            Err(MetadataError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_by_content_hash() {
        let store = MemoryMetadataStore::new();
        store.put(&record("doc-1", b"same")).await.unwrap();

        let found = store
            .find_by_content_hash(&ContentHasher::hash(b"same"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.source_identifier.as_str(), "doc-1");
        assert!(store
            .find_by_content_hash(&ContentHasher::hash(b"different"))
            .await
            .unwrap()
            .is_none());
    }
}
