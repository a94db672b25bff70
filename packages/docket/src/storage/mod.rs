//! Storage backends for raw document bytes.
//!
//! Available backends:
//! - `MemoryStorage` - In-memory storage (tests, dry runs)
//! - `FsStorage` - Local disk with atomic publish

pub mod fs;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::traits::storage::StorageBackend;

pub use fs::FsStorage;
pub use memory::MemoryStorage;

/// Which storage backend to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    Memory,
    Filesystem { root: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from("data/documents"),
        }
    }
}

/// Build the configured backend behind the trait object callers depend on.
pub fn build_storage(config: &StorageConfig) -> Arc<dyn StorageBackend> {
    match config {
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),
        StorageConfig::Filesystem { root } => Arc::new(FsStorage::new(root.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_storage_variants() {
        assert_eq!(build_storage(&StorageConfig::Memory).name(), "memory");
        assert_eq!(
            build_storage(&StorageConfig::Filesystem {
                root: PathBuf::from("/tmp/docket-test")
            })
            .name(),
            "filesystem"
        );
    }
}
