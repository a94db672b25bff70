//! Document Ingestion, Deduplication & Citation Verification
//!
//! Keeps a durable, deduplicated archive of source documents (meeting
//! minutes, agendas, filings) and guarantees that any claim attributed to a
//! document is backed by text actually present in it.
//!
//! # Design Philosophy
//!
//! - Every document is fetched at most once; repeated runs converge
//! - Bytes are written before the metadata that points at them
//! - One failing document never fails the batch
//! - Citations are untrusted until their quote is found in the source
//!
//! # Usage
//!
//! ```rust,ignore
//! use docket::{BatchRunner, CitationVerifier, MemoryMetadataStore, MemoryStorage, PipelineConfig};
//! use docket::discovery::ManifestDiscovery;
//! use docket::fetchers::HttpFetcher;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PipelineConfig::from_env()?;
//! let runner = BatchRunner::new(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryMetadataStore::new()),
//!     Arc::new(HttpFetcher::new()?),
//!     &config,
//! );
//!
//! let outcome = runner
//!     .run(&ManifestDiscovery::new("manifest.jsonl"), CancellationToken::new())
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator abstractions (StorageBackend, MetadataStore, Fetcher, ...)
//! - [`types`] - Documents, records, citations and batch outcomes
//! - [`pipeline`] - Reconciliation, batch running and citation verification
//! - [`storage`] - Byte storage backends (MemoryStorage, FsStorage)
//! - [`stores`] - Metadata stores (MemoryMetadataStore, SqliteMetadataStore)
//! - [`fetchers`] - Fetchers (HttpFetcher, MockFetcher)
//! - [`extractors`] - Text extraction and the stored-text provider
//! - [`discovery`] - Static and manifest discovery
//! - [`testing`] - Mock implementations for testing

pub mod config;
pub mod discovery;
pub mod error;
pub mod extractors;
pub mod fetchers;
pub mod hashing;
pub mod pipeline;
pub mod storage;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use config::PipelineConfig;
pub use error::{
    CitationError, ConfigError, DiscoveryError, FetchError, MetadataError, PipelineError,
    RunError, StorageError,
};
pub use hashing::ContentHasher;
pub use pipeline::{
    Action, BatchRunner, CitationVerifier, Jitter, ReconciliationEngine, RetryPolicy,
    VerificationReport, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use storage::{build_storage, FsStorage, MemoryStorage, StorageConfig};
pub use stores::MemoryMetadataStore;
pub use traits::{
    analyzer::Analyzer,
    discovery::Discovery,
    fetcher::{FetchedDocument, Fetcher},
    metadata::MetadataStore,
    storage::StorageBackend,
    text::{SourceTextProvider, TextExtractor},
};
pub use types::{
    citation::{CandidateClaim, Citation, CitationStatus, Locator},
    document::{ContentHash, DiscoveredDocument, DownloadRecord, SourceIdentifier, StorageKey},
    outcome::{ActionCounts, BatchOutcome, FailureKind, ItemFailure, RunStatus},
    text::{ExtractedText, PageSpan},
};

#[cfg(feature = "sqlite")]
pub use stores::SqliteMetadataStore;
