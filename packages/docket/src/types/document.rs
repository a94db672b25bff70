//! Document identity, content hashes, storage keys and download records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hashing::ContentHasher;

/// Stable name for a document at its origin (usually the canonical URL).
///
/// Never reused for different content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceIdentifier(String);

impl SourceIdentifier {
    /// Create an identifier. The value is kept byte for byte.
    ///
    /// Returns `None` for empty identifiers and for identifiers with leading
    /// or trailing whitespace.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() || value.trim().len() != value.len() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SourceIdentifier {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            "source identifier must be non-empty without surrounding whitespace".to_string()
        })
    }
}

impl From<SourceIdentifier> for String {
    fn from(id: SourceIdentifier) -> Self {
        id.0
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase hex SHA-256 digest of raw document bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an existing hex digest (e.g. read back from a database row).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relative, `/`-separated key into a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The home key of a source: derived from its identifier alone, so the
    /// bytes can be located even when the metadata record is lost.
    pub fn for_source(source: &SourceIdentifier) -> Self {
        let digest = ContentHasher::hash(source.as_str().as_bytes());
        let hex = digest.as_str();
        Self(format!("sources/{}/{}", &hex[..2], hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry yielded by a discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDocument {
    pub source_identifier: SourceIdentifier,

    #[serde(default)]
    pub display_title: String,

    #[serde(default)]
    pub declared_date: Option<NaiveDate>,
}

impl DiscoveredDocument {
    pub fn new(source_identifier: SourceIdentifier, display_title: impl Into<String>) -> Self {
        Self {
            source_identifier,
            display_title: display_title.into(),
            declared_date: None,
        }
    }

    pub fn with_declared_date(mut self, date: NaiveDate) -> Self {
        self.declared_date = Some(date);
        self
    }
}

/// Durable record of a successfully ingested document.
///
/// `storage_key` and `content_hash` never change once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub source_identifier: SourceIdentifier,
    pub storage_key: StorageKey,
    pub content_hash: ContentHash,
    pub captured_at: DateTime<Utc>,
    pub size: u64,

    /// Downstream entity (e.g. an extracted session) linked after ingestion
    #[serde(default)]
    pub derived_entity_id: Option<String>,

    #[serde(default)]
    pub display_title: Option<String>,

    #[serde(default)]
    pub declared_date: Option<NaiveDate>,
}

impl DownloadRecord {
    /// Create a record captured now.
    pub fn new(
        source_identifier: SourceIdentifier,
        storage_key: StorageKey,
        content_hash: ContentHash,
        size: u64,
    ) -> Self {
        Self {
            source_identifier,
            storage_key,
            content_hash,
            captured_at: Utc::now(),
            size,
            derived_entity_id: None,
            display_title: None,
            declared_date: None,
        }
    }

    /// Copy the discovery fields onto the record.
    pub fn with_discovery(mut self, doc: &DiscoveredDocument) -> Self {
        if !doc.display_title.is_empty() {
            self.display_title = Some(doc.display_title.clone());
        }
        self.declared_date = doc.declared_date;
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn with_derived_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.derived_entity_id = Some(entity_id.into());
        self
    }
}
