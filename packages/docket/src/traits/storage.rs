//! Blob storage abstraction.
//!
//! The storage backend exclusively owns raw document bytes. Nothing else in the
//! crate touches the filesystem or object layer directly.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::document::StorageKey;

/// Content store keyed by an opaque [`StorageKey`].
///
/// Implementations:
/// - `MemoryStorage` - in-memory test double
/// - `FsStorage` - local disk with staged, atomically published writes
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store bytes under a key, replacing any previous value.
    ///
    /// Must be atomic: readers see either the old value or the whole new one.
    async fn write(&self, key: &StorageKey, bytes: &[u8]) -> StorageResult<()>;

    /// Read the bytes stored under a key, or `StorageError::NotFound`.
    async fn read(&self, key: &StorageKey) -> StorageResult<Vec<u8>>;

    /// Whether a value is stored under a key.
    async fn exists(&self, key: &StorageKey) -> StorageResult<bool>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &StorageKey) -> StorageResult<()>;

    /// Backend name for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}
