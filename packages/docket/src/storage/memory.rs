//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{StorageError, StorageResult};
use crate::traits::storage::StorageBackend;
use crate::types::document::StorageKey;

/// In-memory blob storage.
///
/// Useful for testing. Data is lost on drop. Supports write-failure
/// injection and out-of-band tampering so repair paths can be exercised.
#[derive(Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<StorageKey, Vec<u8>>>,
    failing_writes: RwLock<HashSet<StorageKey>>,
    writes: AtomicUsize,
    reads: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of reads since creation, including reads of missing keys.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Replace stored bytes without counting a write (simulates silent corruption).
    pub fn corrupt(&self, key: &StorageKey, bytes: impl Into<Vec<u8>>) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), bytes.into());
    }

    /// Make every future write to `key` fail with an I/O error.
    pub fn fail_writes_to(&self, key: &StorageKey) {
        self.failing_writes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<StorageKey> {
        let mut keys: Vec<_> = self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn write(&self, key: &StorageKey, bytes: &[u8]) -> StorageResult<()> {
        if self
            .failing_writes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
        {
            return Err(StorageError::io(
                key.as_str(),
                std::io::Error::new(std::io::ErrorKind::Other, "injected write failure"),
            ));
        }

        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, key: &StorageKey) -> StorageResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn exists(&self, key: &StorageKey) -> StorageResult<bool> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blob_crud() {
        let storage = MemoryStorage::new();
        let key = StorageKey::new("sources/ab/abc");

        assert!(!storage.exists(&key).await.unwrap());
        storage.write(&key, b"hello").await.unwrap();
        assert!(storage.exists(&key).await.unwrap());
        assert_eq!(storage.read(&key).await.unwrap(), b"hello");
        assert_eq!(storage.write_count(), 1);

        storage.delete(&key).await.unwrap();
        assert!(storage.is_empty());
        assert!(matches!(
            storage.read(&key).await,
            Err(StorageError::NotFound { .. })
        ));

        // Deleting again is fine
        storage.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let storage = MemoryStorage::new();
        let key = StorageKey::new("k");
        storage.fail_writes_to(&key);

        assert!(matches!(
            storage.write(&key, b"x").await,
            Err(StorageError::Io { .. })
        ));
        assert!(!storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_does_not_count_as_write() {
        let storage = MemoryStorage::new();
        let key = StorageKey::new("k");
        storage.write(&key, b"good").await.unwrap();
        storage.corrupt(&key, b"bad".to_vec());

        assert_eq!(storage.read(&key).await.unwrap(), b"bad");
        assert_eq!(storage.write_count(), 1);
    }
}
