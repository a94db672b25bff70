//! Batch ingestion over a file-backed SQLite metadata store.
//!
//! Run with `--features sqlite`.

#![cfg(feature = "sqlite")]

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use docket::fetchers::MockFetcher;
use docket::testing::doc;
use docket::{
    BatchRunner, MemoryStorage, MetadataStore, PipelineConfig, RetryPolicy, SourceIdentifier,
    SqliteMetadataStore,
};

async fn file_store(dir: &tempfile::TempDir) -> Arc<SqliteMetadataStore> {
    let url = format!("sqlite://{}", dir.path().join("docket.db").display());
    Arc::new(SqliteMetadataStore::new(&url).await.unwrap())
}

#[tokio::test]
async fn test_concurrent_batch_keeps_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let metadata = file_store(&dir).await;
    let storage = Arc::new(MemoryStorage::new());

    let mut fetcher = MockFetcher::new();
    let mut batch = Vec::new();
    for i in 0..200 {
        let name = format!("doc-{i}");
        fetcher = fetcher.with_document(&name, name.clone().into_bytes());
        batch.push(doc(&name));
    }
    let config = PipelineConfig::default()
        .with_concurrency(8)
        .with_retry(RetryPolicy::immediate(1));
    let runner = BatchRunner::new(storage.clone(), metadata.clone(), Arc::new(fetcher), &config);

    let first = runner
        .run_documents(batch.clone(), CancellationToken::new())
        .await;
    assert!(first.is_success(), "{:?}", first.failures);
    assert_eq!(first.fetched, 200);
    assert_eq!(metadata.count().await.unwrap(), 200);

    let second = runner.run_documents(batch, CancellationToken::new()).await;
    assert!(second.is_success(), "{:?}", second.failures);
    assert_eq!(second.skipped, 200);
}

#[tokio::test]
async fn test_records_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let fetcher = Arc::new(MockFetcher::new().with_document("doc-1", b"hello".to_vec()));
    let config = PipelineConfig::default().with_retry(RetryPolicy::immediate(1));

    {
        let metadata = file_store(&dir).await;
        let runner = BatchRunner::new(storage.clone(), metadata, fetcher.clone(), &config);
        let outcome = runner
            .run_documents(vec![doc("doc-1")], CancellationToken::new())
            .await;
        assert_eq!(outcome.fetched, 1);
    }

    let metadata = file_store(&dir).await;
    let runner = BatchRunner::new(storage, metadata.clone(), fetcher.clone(), &config);
    let outcome = runner
        .run_documents(vec![doc("doc-1")], CancellationToken::new())
        .await;

    assert_eq!(outcome.skipped, 1);
    assert_eq!(fetcher.fetch_count("doc-1"), 1);
    let id = SourceIdentifier::new("doc-1").unwrap();
    assert!(metadata.get(&id).await.unwrap().is_some());
}
