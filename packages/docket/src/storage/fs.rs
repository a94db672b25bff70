//! Local-disk storage backend.
//!
//! Writes are staged under `<root>/.staging/` and published with a rename, so
//! readers never observe a partially written file.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::traits::storage::StorageBackend;
use crate::types::document::StorageKey;

const STAGING_DIR: &str = ".staging";

/// Filesystem-backed blob storage rooted at a directory.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path under the root, rejecting anything that could
    /// escape it.
    fn path_for(&self, key: &StorageKey) -> StorageResult<PathBuf> {
        let raw = key.as_str();
        let invalid = || StorageError::InvalidKey {
            key: raw.to_string(),
        };

        if raw.is_empty() || raw.starts_with('/') || raw.contains('\\') {
            return Err(invalid());
        }

        let mut path = self.root.clone();
        for segment in raw.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment == STAGING_DIR
            {
                return Err(invalid());
            }
            path.push(segment);
        }
        Ok(path)
    }

    async fn write_staged(&self, staged: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(staged).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FsStorage {
    async fn write(&self, key: &StorageKey, bytes: &[u8]) -> StorageResult<()> {
        let target = self.path_for(key)?;
        let staging = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| StorageError::io(key.as_str(), e))?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(key.as_str(), e))?;
        }

        let staged = staging.join(Uuid::new_v4().to_string());
        let published = match self.write_staged(&staged, bytes).await {
            Ok(()) => tokio::fs::rename(&staged, &target).await,
            Err(e) => Err(e),
        };

        if let Err(e) = published {
            if let Err(cleanup) = tokio::fs::remove_file(&staged).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(path = %staged.display(), error = %cleanup, "failed to remove staged file");
                }
            }
            return Err(StorageError::io(key.as_str(), e));
        }

        debug!(key = %key, bytes = bytes.len(), "published blob");
        Ok(())
    }

    async fn read(&self, key: &StorageKey) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(StorageError::io(key.as_str(), e)),
        }
    }

    async fn exists(&self, key: &StorageKey) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StorageError::io(key.as_str(), e))
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(key.as_str(), e)),
        }
    }

    fn name(&self) -> &str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let key = StorageKey::new("sources/ab/abcdef");

        storage.write(&key, b"hello").await.unwrap();
        assert!(storage.exists(&key).await.unwrap());
        assert_eq!(storage.read(&key).await.unwrap(), b"hello");
        assert!(dir.path().join("sources/ab/abcdef").is_file());

        storage.delete(&key).await.unwrap();
        assert!(!storage.exists(&key).await.unwrap());
        storage.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_replaces_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        let key = StorageKey::new("a/b");

        storage.write(&key, b"first version, longer").await.unwrap();
        storage.write(&key, b"second").await.unwrap();
        assert_eq!(storage.read(&key).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_staging_dir_is_left_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        storage.write(&StorageKey::new("x/y"), b"data").await.unwrap();

        let mut entries = std::fs::read_dir(dir.path().join(STAGING_DIR)).unwrap();
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());
        assert!(matches!(
            storage.read(&StorageKey::new("nope")).await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path());

        for bad in ["../etc/passwd", "/abs", "a//b", "a\\b", "", ".staging/x", "a/./b"] {
            let result = storage.write(&StorageKey::new(bad), b"x").await;
            assert!(
                matches!(result, Err(StorageError::InvalidKey { .. })),
                "key {:?} should be rejected",
                bad
            );
        }
    }
}
