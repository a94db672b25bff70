//! Per-run batch reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::reconcile::Action;
use crate::types::document::SourceIdentifier;

/// Failure class recorded for a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TransientFetch,
    PermanentFetch,
    StorageWrite,
    StorageRead,
    Metadata,
    InconsistentState,
    /// The shard worker died; the item's result was lost
    WorkerLost,
}

impl FailureKind {
    /// Items that should be looked at by a person before the next run.
    pub fn needs_review(self) -> bool {
        matches!(self, Self::InconsistentState | Self::WorkerLost)
    }
}

/// One failed item, with enough context to act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub source_identifier: SourceIdentifier,
    pub action: Option<Action>,
    pub kind: FailureKind,
    pub attempts: u32,
    pub error: String,
}

/// How many times each reconciliation action was chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub skip_with_record: usize,
    pub backfill_record: usize,
    pub redownload_and_update: usize,
    pub ingest_new: usize,
}

impl ActionCounts {
    pub fn record(&mut self, action: Action) {
        match action {
            Action::SkipWithRecord => self.skip_with_record += 1,
            Action::BackfillRecord => self.backfill_record += 1,
            Action::RedownloadAndUpdate => self.redownload_and_update += 1,
            Action::IngestNew => self.ingest_new += 1,
        }
    }

    pub fn get(&self, action: Action) -> usize {
        match action {
            Action::SkipWithRecord => self.skip_with_record,
            Action::BackfillRecord => self.backfill_record,
            Action::RedownloadAndUpdate => self.redownload_and_update,
            Action::IngestNew => self.ingest_new,
        }
    }
}

/// Aggregate status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No failures
    Success,
    /// Some items failed
    Partial,
    /// Every attempted item failed
    Failure,
}

/// Machine-readable summary of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    /// Items that completed without failure (skipped + fetched + repaired)
    pub processed: usize,
    pub skipped: usize,
    /// Successful first-time ingests
    pub fetched: usize,
    /// Successful backfills and re-downloads
    pub repaired: usize,
    pub failed: usize,
    /// Ingests that reused bytes already stored for another identifier
    pub deduplicated: usize,
    /// Items never started because the run was cancelled
    pub cancelled: usize,
    pub actions: ActionCounts,
    pub failures: Vec<ItemFailure>,
    /// Recorded sources whose stored bytes failed the re-hash check
    pub integrity_failures: Vec<SourceIdentifier>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchOutcome {
    pub fn new() -> Self {
        Self {
            processed: 0,
            skipped: 0,
            fetched: 0,
            repaired: 0,
            failed: 0,
            deduplicated: 0,
            cancelled: 0,
            actions: ActionCounts::default(),
            failures: Vec::new(),
            integrity_failures: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record a completed item.
    pub fn record_success(&mut self, action: Action, deduplicated: bool) {
        self.actions.record(action);
        self.processed += 1;
        match action {
            Action::SkipWithRecord => self.skipped += 1,
            Action::IngestNew => self.fetched += 1,
            Action::BackfillRecord | Action::RedownloadAndUpdate => self.repaired += 1,
        }
        if deduplicated {
            self.deduplicated += 1;
        }
    }

    /// Record a failed item. `action` is `None` when planning itself failed.
    pub fn record_failure(&mut self, failure: ItemFailure) {
        if let Some(action) = failure.action {
            self.actions.record(action);
        }
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Note corrupt stored bytes, whether or not the repair succeeded.
    pub fn record_integrity_failure(&mut self, source: SourceIdentifier) {
        self.integrity_failures.push(source);
    }

    pub fn record_cancelled(&mut self) {
        self.cancelled += 1;
    }

    /// Fold another partial outcome (e.g. one worker's) into this one.
    pub fn merge(&mut self, other: BatchOutcome) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.fetched += other.fetched;
        self.repaired += other.repaired;
        self.failed += other.failed;
        self.deduplicated += other.deduplicated;
        self.cancelled += other.cancelled;
        self.actions.skip_with_record += other.actions.skip_with_record;
        self.actions.backfill_record += other.actions.backfill_record;
        self.actions.redownload_and_update += other.actions.redownload_and_update;
        self.actions.ingest_new += other.actions.ingest_new;
        self.failures.extend(other.failures);
        self.integrity_failures.extend(other.integrity_failures);
    }

    pub fn finish(&mut self) {
        self.failures
            .sort_by(|a, b| a.source_identifier.cmp(&b.source_identifier));
        self.integrity_failures.sort();
        self.finished_at = Some(Utc::now());
    }

    /// Number of items that were attempted (not cancelled).
    pub fn attempted(&self) -> usize {
        self.processed + self.failed
    }

    pub fn status(&self) -> RunStatus {
        if self.failed == 0 {
            RunStatus::Success
        } else if self.processed == 0 {
            RunStatus::Failure
        } else {
            RunStatus::Partial
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Success
    }

    /// Failures that need a person to look at them.
    pub fn needs_review(&self) -> impl Iterator<Item = &ItemFailure> {
        self.failures.iter().filter(|f| f.kind.needs_review())
    }
}

impl Default for BatchOutcome {
    fn default() -> Self {
        Self::new()
    }
}
