//! Pipeline operations.
//!
//! - `reconcile` - Decide what to do with each discovered document
//! - `retry` - Backoff policy for transient fetch failures
//! - `batch` - Run reconciliation and ingestion over a batch
//! - `similarity` - Normalized fuzzy quote matching
//! - `verify` - Resolve citations against cached source text

pub mod batch;
pub mod reconcile;
pub mod retry;
pub mod similarity;
pub mod verify;

pub use batch::BatchRunner;
pub use reconcile::{decide, Action, Plan, ReconciliationEngine};
pub use retry::{Jitter, RetryPolicy};
pub use similarity::{best_match, normalize, similarity, NormalizedText, SpanMatch};
pub use verify::{CitationVerifier, QuoteScore, VerificationReport, DEFAULT_SIMILARITY_THRESHOLD};
