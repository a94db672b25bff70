//! Docket CLI
//!
//! Runs ingestion batches, inspects download records and verifies citations.
//! Reports are printed as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docket::discovery::ManifestDiscovery;
use docket::extractors::{PlainTextExtractor, StoredTextProvider};
use docket::fetchers::HttpFetcher;
use docket::{
    build_storage, BatchRunner, CandidateClaim, Citation, CitationVerifier, MetadataStore,
    PipelineConfig, RunStatus, SourceIdentifier, SqliteMetadataStore,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/docket.db";

#[derive(Parser)]
#[command(name = "docket")]
#[command(about = "Document ingestion and citation verification")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every document listed in a manifest
    Ingest {
        /// JSON-lines manifest, one document per line
        #[arg(long)]
        manifest: PathBuf,

        /// Override DOCKET_CONCURRENCY
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show the download record for a source
    Status { source_identifier: String },

    /// Verify a JSON array of candidate claims against stored source text
    Verify {
        #[arg(long)]
        citations: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,docket=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Ingest {
            manifest,
            concurrency,
        } => {
            let config = match concurrency {
                Some(n) => config.with_concurrency(n.max(1)),
                None => config,
            };
            cmd_ingest(&config, manifest).await
        }
        Commands::Status { source_identifier } => cmd_status(&config, &source_identifier).await,
        Commands::Verify { citations } => cmd_verify(&config, citations).await,
    }
}

async fn open_metadata(config: &PipelineConfig) -> Result<Arc<SqliteMetadataStore>> {
    let url = match config.database_url.as_deref() {
        Some(url) => url,
        None => {
            tokio::fs::create_dir_all("data")
                .await
                .context("Failed to create data directory")?;
            DEFAULT_DATABASE_URL
        }
    };
    tracing::info!(database_url = %url, "Opening metadata store");
    let store = SqliteMetadataStore::new(url)
        .await
        .with_context(|| format!("Failed to open metadata store at {}", url))?;
    Ok(Arc::new(store))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize report")?
    );
    Ok(())
}

async fn cmd_ingest(config: &PipelineConfig, manifest: PathBuf) -> Result<ExitCode> {
    let metadata = open_metadata(config).await?;
    let storage = build_storage(&config.storage);
    let fetcher = Arc::new(HttpFetcher::new().context("Failed to build HTTP client")?);
    let runner = BatchRunner::new(storage, metadata, fetcher, config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight documents");
            on_signal.cancel();
        }
    });

    let outcome = runner
        .run(&ManifestDiscovery::new(&manifest), cancel)
        .await
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    print_json(&outcome)?;

    for failure in outcome.needs_review() {
        tracing::error!(
            source_identifier = %failure.source_identifier,
            kind = ?failure.kind,
            error = %failure.error,
            "Needs review"
        );
    }

    for source in &outcome.integrity_failures {
        tracing::error!(source_identifier = %source, "Stored bytes failed the integrity check");
    }

    Ok(match outcome.status() {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::Partial => ExitCode::from(1),
        RunStatus::Failure => ExitCode::from(2),
    })
}

async fn cmd_status(config: &PipelineConfig, source_identifier: &str) -> Result<ExitCode> {
    let source = SourceIdentifier::new(source_identifier)
        .context("Source identifier must be non-empty without surrounding whitespace")?;
    let metadata = open_metadata(config).await?;

    match metadata.get(&source).await? {
        Some(record) => {
            print_json(&record)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No download record for {}", source);
            Ok(ExitCode::from(1))
        }
    }
}

async fn cmd_verify(config: &PipelineConfig, citations: PathBuf) -> Result<ExitCode> {
    let raw = tokio::fs::read_to_string(&citations)
        .await
        .with_context(|| format!("Failed to read {}", citations.display()))?;
    let claims: Vec<CandidateClaim> =
        serde_json::from_str(&raw).context("Citations file must be a JSON array of claims")?;

    let metadata = open_metadata(config).await?;
    let storage = build_storage(&config.storage);
    let provider = StoredTextProvider::new(storage, metadata, PlainTextExtractor);
    let verifier = CitationVerifier::new(provider, config.similarity_threshold);

    let report = verifier
        .verify_all(claims.into_iter().map(Citation::from).collect())
        .await;
    print_json(&report)?;

    Ok(if report.rejected == 0 && report.unverifiable == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
