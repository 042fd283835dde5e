//! SqliteJobStore - durable job store on SQLite via sqlx.
//!
//! Every lifecycle write is a single conditional `UPDATE`, which gives the
//! row-level atomicity the engine needs: the `WHERE status IN (...)` guard keeps
//! terminal rows final, and `MAX(attempts, MIN(?, max_attempts))` makes attempt
//! writes idempotent and monotonic.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use crate::domain::job::normalize_result;
use crate::domain::{ApplyOutcome, JobId, JobRecord, JobStatus, LifecycleEvent};
use crate::ports::{JobStore, StoreError};

const MARK_PROCESSING: &str = "UPDATE jobs
    SET status = 'processing',
        attempts = MAX(attempts, MIN(?2, max_attempts)),
        updated_at = ?3
    WHERE id = ?1 AND status IN ('pending', 'processing')";

const MARK_COMPLETED: &str = "UPDATE jobs
    SET status = 'completed',
        result = ?4,
        error = NULL,
        attempts = MAX(attempts, MIN(?2, max_attempts)),
        updated_at = ?3
    WHERE id = ?1 AND status IN ('pending', 'processing')";

const MARK_FAILED: &str = "UPDATE jobs
    SET status = 'failed',
        error = ?4,
        result = NULL,
        attempts = MAX(attempts, MIN(?2, max_attempts)),
        updated_at = ?3
    WHERE id = ?1 AND status IN ('pending', 'processing')";

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        debug!(url, "opening sqlite job store");
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. One connection, kept for the pool's lifetime,
    /// since every SQLite memory connection is its own database.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'default',
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                result TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn exists(&self, id: JobId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    fn row_to_record(row: &SqliteRow) -> Result<JobRecord, StoreError> {
        let id: String = row.try_get("id")?;
        let priority: String = row.try_get("priority")?;
        let payload: String = row.try_get("payload")?;
        let status: String = row.try_get("status")?;
        let attempts: i64 = row.try_get("attempts")?;
        let max_attempts: i64 = row.try_get("max_attempts")?;
        let result: Option<String> = row.try_get("result")?;

        Ok(JobRecord {
            id: id
                .parse()
                .map_err(|e: crate::domain::ParseIdError| StoreError::Corrupt(e.to_string()))?,
            job_type: row.try_get("type")?,
            priority: priority
                .parse()
                .map_err(|e: crate::domain::ParsePriorityError| StoreError::Corrupt(e.to_string()))?,
            payload: serde_json::from_str(&payload)?,
            status: JobStatus::from_str(&status).map_err(StoreError::Corrupt)?,
            attempts: to_u32(attempts)?,
            max_attempts: to_u32(max_attempts)?,
            result: result.map(|r| serde_json::from_str(&r)).transpose()?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn to_u32(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("attempt count {value} out of range")))
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, record), fields(job_id = %record.id))]
    async fn insert(&self, record: &JobRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, type, priority, payload, status, attempts, max_attempts,
                              result, error, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.job_type)
        .bind(record.priority.as_str())
        .bind(serde_json::to_string(&record.payload)?)
        .bind(record.status.as_str())
        .bind(i64::from(record.attempts))
        .bind(i64::from(record.max_attempts))
        .bind(record.result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(record.error.as_deref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    #[instrument(skip(self, event), fields(job_id = %id, event = event.name()))]
    async fn apply(
        &self,
        id: JobId,
        event: &LifecycleEvent,
        at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, StoreError> {
        let attempt = i64::from(event.attempt());
        let query = match event {
            LifecycleEvent::Dispatched { .. } => sqlx::query(MARK_PROCESSING)
                .bind(id.to_string())
                .bind(attempt)
                .bind(at),
            LifecycleEvent::Completed { result, .. } => sqlx::query(MARK_COMPLETED)
                .bind(id.to_string())
                .bind(attempt)
                .bind(at)
                .bind(serde_json::to_string(&normalize_result(result.clone()))?),
            LifecycleEvent::Failed { error, .. } => sqlx::query(MARK_FAILED)
                .bind(id.to_string())
                .bind(attempt)
                .bind(at)
                .bind(error.clone()),
        };

        let done = query.execute(&self.pool).await?;
        if done.rows_affected() > 0 {
            return Ok(ApplyOutcome::Updated);
        }

        if self.exists(id).await? {
            Ok(ApplyOutcome::Ignored)
        } else {
            Ok(ApplyOutcome::Missing)
        }
    }

    async fn list_open(&self) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM jobs WHERE status IN ('pending', 'processing') ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_record).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
