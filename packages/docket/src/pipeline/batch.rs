//! Batch ingestion: discover → reconcile → act, with bounded concurrency.
//!
//! Items are routed to a fixed number of shard workers by source identifier,
//! so at most `concurrency` items are in flight and two items with the same
//! identifier are never processed at the same time. A failing item is
//! recorded in the [`BatchOutcome`] and never stops the rest of the batch.
//!
//! Cancellation stops dispatch and drains queued items unstarted. An item
//! already being processed runs to completion, retries included.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, RunError, StorageError};
use crate::hashing::ContentHasher;
use crate::pipeline::reconcile::{Action, Plan, ReconciliationEngine};
use crate::pipeline::retry::RetryPolicy;
use crate::traits::{
    discovery::Discovery,
    fetcher::{FetchedDocument, Fetcher},
    metadata::MetadataStore,
    storage::StorageBackend,
};
use crate::types::document::{ContentHash, DiscoveredDocument, DownloadRecord, SourceIdentifier};
use crate::types::outcome::{BatchOutcome, FailureKind, ItemFailure};

/// Queued items per shard before the dispatcher waits.
const SHARD_QUEUE_DEPTH: usize = 32;

struct Shared {
    engine: ReconciliationEngine,
    storage: Arc<dyn StorageBackend>,
    metadata: Arc<dyn MetadataStore>,
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
}

/// Successful item.
struct Completed {
    action: Action,
    deduplicated: bool,
}

/// What planning found, kept for the report even if the action fails.
#[derive(Default)]
struct Progress {
    action: Option<Action>,
    integrity_failure: bool,
}

/// Runs the ingestion pipeline over a batch of discovered documents.
pub struct BatchRunner {
    shared: Arc<Shared>,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        metadata: Arc<dyn MetadataStore>,
        fetcher: Arc<dyn Fetcher>,
        config: &PipelineConfig,
    ) -> Self {
        let engine = ReconciliationEngine::new(storage.clone(), metadata.clone())
            .with_integrity_check(config.verify_on_skip);
        Self {
            shared: Arc::new(Shared {
                engine,
                storage,
                metadata,
                fetcher,
                retry: config.retry.clone(),
            }),
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Discover documents and ingest them.
    ///
    /// Only a discovery failure is returned as an error; item failures are
    /// reported in the outcome.
    pub async fn run(
        &self,
        discovery: &dyn Discovery,
        cancel: CancellationToken,
    ) -> std::result::Result<BatchOutcome, RunError> {
        let documents = discovery.discover().await?;
        info!(discovered = documents.len(), "discovery complete");
        Ok(self.run_documents(documents, cancel).await)
    }

    /// Ingest an already-discovered batch.
    pub async fn run_documents(
        &self,
        documents: Vec<DiscoveredDocument>,
        cancel: CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::new();
        let total = documents.len();
        if total == 0 {
            outcome.finish();
            return outcome;
        }

        let shards = self.concurrency.min(total);
        let mut senders = Vec::with_capacity(shards);
        let mut workers: Vec<JoinHandle<BatchOutcome>> = Vec::with_capacity(shards);
        for shard in 0..shards {
            let (tx, rx) = mpsc::channel(SHARD_QUEUE_DEPTH);
            senders.push(tx);
            workers.push(tokio::spawn(shard_worker(
                shard,
                self.shared.clone(),
                rx,
                cancel.clone(),
            )));
        }

        info!(items = total, shards, "batch started");

        // Identifiers handed to each shard, reported as lost if it dies.
        let mut dispatched: Vec<Vec<SourceIdentifier>> = vec![Vec::new(); shards];
        for doc in documents {
            if cancel.is_cancelled() {
                outcome.record_cancelled();
                continue;
            }

            let shard = shard_for(&doc, shards);
            let source = doc.source_identifier.clone();
            tokio::select! {
                sent = senders[shard].send(doc) => {
                    match sent {
                        Ok(()) => dispatched[shard].push(source),
                        Err(mpsc::error::SendError(doc)) => {
                            error!(
                                shard,
                                source_identifier = %doc.source_identifier,
                                "shard worker stopped early"
                            );
                            outcome.record_failure(lost_item(doc.source_identifier));
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    outcome.record_cancelled();
                }
            }
        }
        drop(senders);

        for (shard, (worker, sources)) in workers.into_iter().zip(dispatched).enumerate() {
            match worker.await {
                Ok(partial) => outcome.merge(partial),
                Err(e) => {
                    error!(shard, items = sources.len(), error = %e, "shard worker panicked");
                    for source in sources {
                        outcome.record_failure(lost_item(source));
                    }
                }
            }
        }

        outcome.finish();
        info!(
            processed = outcome.processed,
            skipped = outcome.skipped,
            fetched = outcome.fetched,
            repaired = outcome.repaired,
            deduplicated = outcome.deduplicated,
            integrity_failures = outcome.integrity_failures.len(),
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            status = ?outcome.status(),
            "batch complete"
        );
        outcome
    }
}

fn lost_item(source: SourceIdentifier) -> ItemFailure {
    ItemFailure {
        source_identifier: source,
        action: None,
        kind: FailureKind::WorkerLost,
        attempts: 0,
        error: "shard worker stopped before reporting this item".to_string(),
    }
}

fn shard_for(doc: &DiscoveredDocument, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    doc.source_identifier.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

async fn shard_worker(
    shard: usize,
    shared: Arc<Shared>,
    mut rx: mpsc::Receiver<DiscoveredDocument>,
    cancel: CancellationToken,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::new();

    while let Some(doc) = rx.recv().await {
        if cancel.is_cancelled() {
            debug!(shard, source_identifier = %doc.source_identifier, "skipped after cancel");
            outcome.record_cancelled();
            continue;
        }

        let mut progress = Progress::default();
        let result = shared.process(&doc, &mut progress).await;
        if progress.integrity_failure {
            outcome.record_integrity_failure(doc.source_identifier.clone());
        }
        let action = progress.action;
        match result {
            Ok(done) => {
                info!(
                    shard,
                    source_identifier = %doc.source_identifier,
                    action = %done.action,
                    deduplicated = done.deduplicated,
                    "item complete"
                );
                outcome.record_success(done.action, done.deduplicated);
            }
            Err(e) => {
                if e.kind().needs_review() {
                    error!(
                        shard,
                        source_identifier = %doc.source_identifier,
                        action = action.map(Action::as_str),
                        kind = ?e.kind(),
                        error = %e,
                        "item failed, needs review"
                    );
                } else {
                    warn!(
                        shard,
                        source_identifier = %doc.source_identifier,
                        action = action.map(Action::as_str),
                        kind = ?e.kind(),
                        attempts = e.attempts(),
                        error = %e,
                        "item failed"
                    );
                }
                outcome.record_failure(ItemFailure {
                    source_identifier: doc.source_identifier.clone(),
                    action,
                    kind: e.kind(),
                    attempts: e.attempts(),
                    error: e.to_string(),
                });
            }
        }
    }

    outcome
}

impl Shared {
    /// Plan and act on one item. `progress` is filled in as soon as the plan
    /// is known.
    async fn process(&self, doc: &DiscoveredDocument, progress: &mut Progress) -> Result<Completed> {
        let plan = self.engine.plan(&doc.source_identifier).await?;
        progress.action = Some(plan.action);
        progress.integrity_failure = plan.integrity_failure;

        let deduplicated = match plan.action {
            Action::SkipWithRecord => false,
            Action::BackfillRecord => {
                self.backfill(doc, &plan).await?;
                false
            }
            Action::RedownloadAndUpdate => {
                self.redownload(doc, &plan).await?;
                false
            }
            Action::IngestNew => self.ingest_new(doc, &plan).await?,
        };

        Ok(Completed {
            action: plan.action,
            deduplicated,
        })
    }

    async fn fetch(&self, doc: &DiscoveredDocument) -> Result<FetchedDocument> {
        let source = &doc.source_identifier;
        self.retry
            .run(source, move |attempt| {
                debug!(source_identifier = %source, attempt, fetcher = self.fetcher.name(), "fetching");
                self.fetcher.fetch(source)
            })
            .await
    }

    /// Bytes exist at the home key but the record is gone: rebuild it.
    async fn backfill(&self, doc: &DiscoveredDocument, plan: &Plan) -> Result<()> {
        let bytes = self
            .storage
            .read(&plan.storage_key)
            .await
            .map_err(PipelineError::StorageRead)?;

        let record = DownloadRecord::new(
            doc.source_identifier.clone(),
            plan.storage_key.clone(),
            ContentHasher::hash(&bytes),
            bytes.len() as u64,
        )
        .with_discovery(doc);

        self.metadata.put(&record).await?;
        Ok(())
    }

    /// Record exists but bytes are gone (or corrupt): fetch into the same key.
    ///
    /// The record itself is left as it is.
    async fn redownload(&self, doc: &DiscoveredDocument, plan: &Plan) -> Result<()> {
        let Some(record) = &plan.record else {
            return Err(PipelineError::InconsistentState {
                source_identifier: doc.source_identifier.to_string(),
                reason: "redownload planned without a record".to_string(),
            });
        };

        let fetched = self.fetch(doc).await?;
        let hash = ContentHasher::hash(&fetched.bytes);
        if hash != record.content_hash {
            return Err(PipelineError::InconsistentState {
                source_identifier: doc.source_identifier.to_string(),
                reason: format!(
                    "content changed at origin: recorded {}, fetched {}",
                    record.content_hash, hash
                ),
            });
        }

        self.storage
            .write(&record.storage_key, &fetched.bytes)
            .await
            .map_err(PipelineError::StorageWrite)
    }

    /// First sighting. Returns whether the bytes were deduplicated against
    /// another source's stored copy.
    async fn ingest_new(&self, doc: &DiscoveredDocument, plan: &Plan) -> Result<bool> {
        let fetched = self.fetch(doc).await?;
        let hash = ContentHasher::hash(&fetched.bytes);
        let size = fetched.bytes.len() as u64;

        let (storage_key, deduplicated) = match self.reusable_copy(doc, &hash).await? {
            Some(existing) => {
                debug!(
                    source_identifier = %doc.source_identifier,
                    duplicate_of = %existing.source_identifier,
                    content_hash = %hash,
                    "reusing stored bytes"
                );
                (existing.storage_key, true)
            }
            None => {
                self.storage
                    .write(&plan.storage_key, &fetched.bytes)
                    .await
                    .map_err(PipelineError::StorageWrite)?;
                (plan.storage_key.clone(), false)
            }
        };

        let record = DownloadRecord::new(doc.source_identifier.clone(), storage_key, hash, size)
            .with_captured_at(fetched.fetched_at)
            .with_discovery(doc);
        self.metadata.put(&record).await?;
        Ok(deduplicated)
    }

    /// Another source's record with the same content whose bytes are present.
    async fn reusable_copy(
        &self,
        doc: &DiscoveredDocument,
        hash: &ContentHash,
    ) -> Result<Option<DownloadRecord>> {
        let Some(existing) = self.metadata.find_by_content_hash(hash).await? else {
            return Ok(None);
        };
        if existing.source_identifier == doc.source_identifier {
            return Ok(None);
        }

        match self.storage.exists(&existing.storage_key).await {
            Ok(true) => Ok(Some(existing)),
            Ok(false) => Ok(None),
            Err(e @ StorageError::InvalidKey { .. }) => {
                warn!(
                    source_identifier = %existing.source_identifier,
                    error = %e,
                    "ignoring duplicate with unusable key"
                );
                Ok(None)
            }
            Err(e) => Err(PipelineError::StorageRead(e)),
        }
    }
}
