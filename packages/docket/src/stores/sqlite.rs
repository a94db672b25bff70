//! SQLite metadata store.
//!
//! A file-based metadata backend. Schema changes are additive: each optional
//! column is added only after checking that it is not already present, so
//! running migrations any number of times is safe.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{MetadataError, MetadataResult};
use crate::traits::metadata::{check_immutable_fields, MetadataStore};
use crate::types::document::{ContentHash, DownloadRecord, SourceIdentifier, StorageKey};

/// Columns added after the original schema, in the order they were introduced.
const ADDITIVE_COLUMNS: &[(&str, &str)] = &[
    ("derived_entity_id", "TEXT"),
    ("display_title", "TEXT"),
    ("declared_date", "TEXT"),
];

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SELECT_COLUMNS: &str = "source_identifier, storage_key, content_hash, captured_at, size, \
                              derived_entity_id, display_title, declared_date";

fn backend(e: sqlx::Error) -> MetadataError {
    MetadataError::Backend(Box::new(e))
}

/// What a migration run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub added_columns: Vec<String>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.added_columns.is_empty()
    }
}

/// SQLite-based metadata store.
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Open (creating if needed) a database and run migrations.
    ///
    /// # Example URLs
    /// - `sqlite://./docket.db` - File-based database
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    pub async fn new(database_url: &str) -> MetadataResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(backend)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(backend)?;

        Self::from_pool(pool).await
    }

    /// Create an in-memory store (for testing).
    ///
    /// Limited to one connection: every SQLite `:memory:` connection is a
    /// separate database.
    pub async fn in_memory() -> MetadataResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(backend)?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool and run migrations.
    pub async fn from_pool(pool: SqlitePool) -> MetadataResult<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> MetadataResult<MigrationReport> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS download_records (
                source_identifier TEXT PRIMARY KEY,
                storage_key TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                captured_at TEXT NOT NULL,
                size INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_download_records_content_hash \
             ON download_records(content_hash)",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        let mut report = MigrationReport::default();
        for (column, column_type) in ADDITIVE_COLUMNS {
            if self.has_column(column).await? {
                continue;
            }
            sqlx::query(&format!(
                "ALTER TABLE download_records ADD COLUMN {} {}",
                column, column_type
            ))
            .execute(&self.pool)
            .await
            .map_err(backend)?;

            info!(column = %column, "added download_records column");
            report.added_columns.push((*column).to_string());
        }

        Ok(report)
    }

    async fn has_column(&self, column: &str) -> MetadataResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_table_info('download_records') WHERE name = ?",
        )
        .bind(column)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        Ok(count > 0)
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct RecordRow {
    source_identifier: String,
    storage_key: String,
    content_hash: String,
    captured_at: String,
    size: i64,
    derived_entity_id: Option<String>,
    display_title: Option<String>,
    declared_date: Option<String>,
}

impl RecordRow {
    fn into_record(self) -> MetadataResult<DownloadRecord> {
        let source_identifier = SourceIdentifier::new(&self.source_identifier)
            .ok_or_else(|| MetadataError::Decode("empty source_identifier".to_string()))?;

        let captured_at = DateTime::parse_from_rfc3339(&self.captured_at)
            .map_err(|e| MetadataError::Decode(format!("invalid captured_at: {}", e)))?
            .with_timezone(&Utc);

        let declared_date = self
            .declared_date
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| MetadataError::Decode(format!("invalid declared_date: {}", e)))?;

        let size = u64::try_from(self.size)
            .map_err(|_| MetadataError::Decode(format!("negative size {}", self.size)))?;

        Ok(DownloadRecord {
            source_identifier,
            storage_key: StorageKey::new(self.storage_key),
            content_hash: ContentHash::from_hex(self.content_hash),
            captured_at,
            size,
            derived_entity_id: self.derived_entity_id,
            display_title: self.display_title,
            declared_date,
        })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, source: &SourceIdentifier) -> MetadataResult<Option<DownloadRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM download_records WHERE source_identifier = ?",
            SELECT_COLUMNS
        ))
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(RecordRow::into_record).transpose()
    }

    async fn put(&self, record: &DownloadRecord) -> MetadataResult<()> {
        let size = i64::try_from(record.size)
            .map_err(|_| MetadataError::Decode(format!("size {} out of range", record.size)))?;

        // Immutable-field check and write in one statement.
        let result = sqlx::query(
            r#"
            INSERT INTO download_records (
                source_identifier, storage_key, content_hash, captured_at, size,
                derived_entity_id, display_title, declared_date
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_identifier) DO UPDATE SET
                derived_entity_id = excluded.derived_entity_id,
                display_title = excluded.display_title,
                declared_date = excluded.declared_date
            WHERE download_records.storage_key = excluded.storage_key
              AND download_records.content_hash = excluded.content_hash
            "#,
        )
        .bind(record.source_identifier.as_str())
        .bind(record.storage_key.as_str())
        .bind(record.content_hash.as_str())
        .bind(record.captured_at.to_rfc3339())
        .bind(size)
        .bind(&record.derived_entity_id)
        .bind(&record.display_title)
        .bind(record.declared_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // The row exists and the guard refused the update.
        match self.get(&record.source_identifier).await? {
            Some(existing) => check_immutable_fields(&existing, record),
            None => Err(MetadataError::Decode(format!(
                "upsert of {} changed no rows",
                record.source_identifier
            ))),
        }
    }

    async fn delete(&self, source: &SourceIdentifier) -> MetadataResult<()> {
        sqlx::query("DELETE FROM download_records WHERE source_identifier = ?")
            .bind(source.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn find_by_content_hash(
        &self,
        hash: &ContentHash,
    ) -> MetadataResult<Option<DownloadRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM download_records WHERE content_hash = ? \
             ORDER BY source_identifier LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(hash.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(RecordRow::into_record).transpose()
    }

    async fn count(&self) -> MetadataResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM download_records")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        Ok(count as usize)
    }

    async fn list(&self) -> MetadataResult<Vec<DownloadRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {} FROM download_records ORDER BY source_identifier",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }
}
