//! Content fingerprints for deduplication and integrity checks.

use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::types::document::{ContentHash, StorageKey};

/// SHA-256 content hasher. Pure and deterministic.
pub struct ContentHasher;

impl ContentHasher {
    /// Hash raw bytes.
    pub fn hash(bytes: &[u8]) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        ContentHash::from_hex(hex::encode(hasher.finalize()))
    }

    /// Re-hash bytes read from storage and compare to the recorded hash.
    pub fn verify(
        key: &StorageKey,
        bytes: &[u8],
        expected: &ContentHash,
    ) -> Result<(), StorageError> {
        let actual = Self::hash(bytes);
        if &actual == expected {
            Ok(())
        } else {
            Err(StorageError::Integrity {
                key: key.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}
