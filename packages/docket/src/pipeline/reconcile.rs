//! Reconciliation: choosing the ingestion action for one source.
//!
//! The decision is a pure function of two facts, whether bytes exist in
//! storage and whether a metadata record exists:
//!
//! | file | record | action                  |
//! |------|--------|-------------------------|
//! | yes  | yes    | `SkipWithRecord`        |
//! | yes  | no     | `BackfillRecord`        |
//! | no   | yes    | `RedownloadAndUpdate`   |
//! | no   | no     | `IngestNew`             |
//!
//! [`ReconciliationEngine::plan`] gathers those two facts (existence checks
//! only, plus the optional re-hash of stored bytes) and applies [`decide`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{PipelineError, Result, StorageError};
use crate::hashing::ContentHasher;
use crate::traits::{metadata::MetadataStore, storage::StorageBackend};
use crate::types::document::{DownloadRecord, SourceIdentifier, StorageKey};

/// What the pipeline must do for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Already fully ingested; no work
    SkipWithRecord,

    /// Bytes survived but metadata was lost; rebuild the record from the bytes
    BackfillRecord,

    /// Metadata survived but bytes are missing; fetch again into the same key
    RedownloadAndUpdate,

    /// First sighting; fetch, hash, store, record
    IngestNew,
}

impl Action {
    pub fn requires_fetch(self) -> bool {
        matches!(self, Self::RedownloadAndUpdate | Self::IngestNew)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SkipWithRecord => "skip_with_record",
            Self::BackfillRecord => "backfill_record",
            Self::RedownloadAndUpdate => "redownload_and_update",
            Self::IngestNew => "ingest_new",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reconciliation table.
pub fn decide(file_exists: bool, record_exists: bool) -> Action {
    match (file_exists, record_exists) {
        (true, true) => Action::SkipWithRecord,
        (true, false) => Action::BackfillRecord,
        (false, true) => Action::RedownloadAndUpdate,
        (false, false) => Action::IngestNew,
    }
}

/// Decision for one source plus the facts it was made from.
#[derive(Debug, Clone)]
pub struct Plan {
    pub source_identifier: SourceIdentifier,
    pub action: Action,

    /// Where the bytes live (the record's key, or the source's home key)
    pub storage_key: StorageKey,

    pub record: Option<DownloadRecord>,

    /// Stored bytes existed but failed the re-hash check
    pub integrity_failure: bool,
}

/// Reads storage and metadata state and decides the action for a source.
///
/// Never writes to either store.
pub struct ReconciliationEngine {
    storage: Arc<dyn StorageBackend>,
    metadata: Arc<dyn MetadataStore>,
    verify_on_skip: bool,
}

impl ReconciliationEngine {
    pub fn new(storage: Arc<dyn StorageBackend>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            storage,
            metadata,
            verify_on_skip: false,
        }
    }

    /// Re-hash stored bytes of recorded documents before deciding to skip.
    ///
    /// Off by default: it reads every stored blob on every run.
    pub fn with_integrity_check(mut self, enabled: bool) -> Self {
        self.verify_on_skip = enabled;
        self
    }

    /// Gather state for `source` and choose its action.
    pub async fn plan(&self, source: &SourceIdentifier) -> Result<Plan> {
        let record = self.metadata.get(source).await?;

        if let Some(record) = &record {
            if &record.source_identifier != source {
                return Err(PipelineError::InconsistentState {
                    source_identifier: source.to_string(),
                    reason: format!(
                        "lookup returned record for {}",
                        record.source_identifier
                    ),
                });
            }
        }

        let storage_key = record
            .as_ref()
            .map(|r| r.storage_key.clone())
            .unwrap_or_else(|| StorageKey::for_source(source));

        let mut file_exists = self
            .storage
            .exists(&storage_key)
            .await
            .map_err(PipelineError::StorageRead)?;

        let mut integrity_failure = false;
        if let (true, true, Some(record)) = (file_exists, self.verify_on_skip, &record) {
            match self.check_integrity(record).await {
                Ok(intact) => {
                    file_exists = intact;
                    integrity_failure = !intact;
                }
                Err(e) => return Err(PipelineError::StorageRead(e)),
            }
        }

        let action = decide(file_exists, record.is_some());
        debug!(
            source_identifier = %source,
            storage_key = %storage_key,
            file_exists,
            record_exists = record.is_some(),
            action = %action,
            "reconciled"
        );

        Ok(Plan {
            source_identifier: source.clone(),
            action,
            storage_key,
            record,
            integrity_failure,
        })
    }

    /// `Ok(false)` when the bytes vanished or no longer match the record.
    async fn check_integrity(&self, record: &DownloadRecord) -> std::result::Result<bool, StorageError> {
        let bytes = match self.storage.read(&record.storage_key).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        match ContentHasher::verify(&record.storage_key, &bytes, &record.content_hash) {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(
                    source_identifier = %record.source_identifier,
                    storage_key = %record.storage_key,
                    error = %e,
                    "stored bytes are corrupt; treating as missing"
                );
                Ok(false)
            }
        }
    }
}
