//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can match on
//! the exact failure class. Item-level failures are collected into a
//! [`BatchOutcome`](crate::types::outcome::BatchOutcome) rather than raised.

use thiserror::Error;

use crate::types::outcome::FailureKind;

/// Errors returned by a [`Fetcher`](crate::traits::fetcher::Fetcher).
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network/timeout class failure; safe to retry.
    #[error("transient fetch failure for {source_identifier}: {reason}")]
    Transient {
        source_identifier: String,
        reason: String,
    },

    /// The resource is gone or can never be fetched; never retried.
    #[error("permanent fetch failure for {source_identifier}: {reason}")]
    Permanent {
        source_identifier: String,
        reason: String,
    },
}

impl FetchError {
    /// Build a transient error.
    pub fn transient(source_identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            source_identifier: source_identifier.into(),
            reason: reason.into(),
        }
    }

    /// Build a permanent error.
    pub fn permanent(source_identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permanent {
            source_identifier: source_identifier.into(),
            reason: reason.into(),
        }
    }

    /// Whether the retry policy may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Errors from a [`StorageBackend`](crate::traits::storage::StorageBackend).
#[derive(Debug, Error)]
pub enum StorageError {
    /// No value stored under the key
    #[error("storage key not found: {key}")]
    NotFound { key: String },

    /// Underlying I/O failed
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key is not a safe relative path
    #[error("invalid storage key: {key}")]
    InvalidKey { key: String },

    /// Stored bytes no longer hash to the recorded content hash
    #[error("integrity mismatch for {key}: expected {expected}, found {actual}")]
    Integrity {
        key: String,
        expected: String,
        actual: String,
    },
}

impl StorageError {
    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Errors from a [`MetadataStore`](crate::traits::metadata::MetadataStore).
#[derive(Debug, Error)]
pub enum MetadataError {
    /// An upsert tried to change an immutable field of an existing record
    #[error("conflicting {field} for {source_identifier}: stored {stored}, attempted {attempted}")]
    Conflict {
        source_identifier: String,
        field: &'static str,
        stored: String,
        attempted: String,
    },

    /// No record exists for the identifier
    #[error("no download record for {source_identifier}")]
    NotFound { source_identifier: String },

    /// The backing database failed
    #[error("metadata backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored row could not be decoded
    #[error("metadata decode error: {0}")]
    Decode(String),
}

/// Per-item pipeline failure. Always caught at the batch boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Fetch failed after the retry policy gave up (or immediately, if permanent)
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: FetchError,
    },

    /// Bytes could not be written; no metadata was touched
    #[error("storage write failed: {0}")]
    StorageWrite(#[source] StorageError),

    /// Bytes could not be read back
    #[error("storage read failed: {0}")]
    StorageRead(#[source] StorageError),

    /// Metadata store rejected or failed the request
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// A state the reconciliation table cannot explain
    #[error("inconsistent state for {source_identifier}: {reason}")]
    InconsistentState {
        source_identifier: String,
        reason: String,
    },
}

impl PipelineError {
    /// Classify for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Fetch {
                source: FetchError::Transient { .. },
                ..
            } => FailureKind::TransientFetch,
            Self::Fetch {
                source: FetchError::Permanent { .. },
                ..
            } => FailureKind::PermanentFetch,
            Self::StorageWrite(_) => FailureKind::StorageWrite,
            Self::StorageRead(_) => FailureKind::StorageRead,
            Self::Metadata(_) => FailureKind::Metadata,
            Self::InconsistentState { .. } => FailureKind::InconsistentState,
        }
    }

    /// Number of fetch attempts made before the failure (0 if no fetch ran).
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Fetch { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}

/// Errors from citation handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CitationError {
    /// Status transitions only leave `pending`
    #[error("citation already resolved as {status}")]
    AlreadyResolved { status: String },
}

/// Errors produced by discovery collaborators.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Manifest could not be read
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A manifest line was not a valid document entry
    #[error("invalid manifest entry on line {line}: {reason}")]
    InvalidEntry { line: usize, reason: String },
}

/// Errors raised while building configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was present but not parseable
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors surfaced by `BatchRunner::run` itself (never by individual items).
#[derive(Debug, Error)]
pub enum RunError {
    /// The discovery collaborator failed before any item was dispatched
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Result alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result alias for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

/// Result alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result alias for per-item pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
