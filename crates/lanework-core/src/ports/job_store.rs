//! JobStore port: the durable source of truth for job status.
//!
//! Implementations need row-level atomicity per job id and nothing more; no
//! operation spans several jobs.
//!
//! # 実装詳細
//! - `apply` は終端状態（`completed` / `failed`）の行を変更しない
//! - `attempts` は単調増加で、`max_attempts` で頭打ちになる
//! - `list_open` は再起動時の復旧に使う。ブローカー側の状態は揮発するため、
//!   未完了ジョブを再投入できるのはストアだけ

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ApplyOutcome, JobId, JobRecord, LifecycleEvent};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt job row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a freshly created record (status `pending`).
    async fn insert(&self, record: &JobRecord) -> Result<(), StoreError>;

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Apply a lifecycle event atomically for one job, following the rules of
    /// [`JobRecord::apply`]. Must be idempotent under redelivery.
    async fn apply(
        &self,
        id: JobId,
        event: &LifecycleEvent,
        at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, StoreError>;

    /// Records that are `pending` or `processing`, oldest first. Used on
    /// startup to put unfinished jobs back on their lanes.
    async fn list_open(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Release connections. Called last during shutdown.
    async fn close(&self);
}
