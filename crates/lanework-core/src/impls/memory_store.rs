//! InMemoryJobStore - job store for development and tests.
//!
//! Besides the map itself it can simulate an outage, which is how the worker's
//! best-effort status writes are exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{ApplyOutcome, JobId, JobRecord, LifecycleEvent};
use crate::ports::{JobStore, StoreError};

#[derive(Default)]
pub struct InMemoryJobStore {
    records: Mutex<HashMap<JobId, JobRecord>>,
    unavailable: AtomicBool,
    failures_remaining: AtomicU32,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Unavailable`] until turned back on.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Fail the next `n` calls, then recover.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        let injected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.check_available()?;
        self.records.lock().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        self.check_available()?;
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn apply(
        &self,
        id: JobId,
        event: &LifecycleEvent,
        at: DateTime<Utc>,
    ) -> Result<ApplyOutcome, StoreError> {
        self.check_available()?;
        let mut records = self.records.lock().await;
        Ok(match records.get_mut(&id) {
            Some(record) => record.apply(event, at),
            None => ApplyOutcome::Missing,
        })
    }

    async fn list_open(&self) -> Result<Vec<JobRecord>, StoreError> {
        self.check_available()?;
        let records = self.records.lock().await;
        let mut open: Vec<JobRecord> = records
            .values()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by_key(|r| (r.created_at, r.id));
        Ok(open)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobStatus, NewJob};
    use ulid::Ulid;

    fn record() -> JobRecord {
        JobRecord::new(
            JobId::from_ulid(Ulid::new()),
            NewJob::new("EMAIL_SEND", serde_json::json!({"to": "a@example.com"})),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_get_apply() {
        let store = InMemoryJobStore::new();
        let r = record();
        store.insert(&r).await.unwrap();

        let outcome = store
            .apply(r.id, &LifecycleEvent::Dispatched { attempt: 1 }, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Updated);

        let stored = store.get(r.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.attempts, 1);
    }

    #[tokio::test]
    async fn apply_to_unknown_id_reports_missing() {
        let store = InMemoryJobStore::new();
        let outcome = store
            .apply(record().id, &LifecycleEvent::Dispatched { attempt: 1 }, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Missing);
    }

    #[tokio::test]
    async fn list_open_skips_terminal_records() {
        let store = InMemoryJobStore::new();
        let (pending, running, done) = (record(), record(), record());
        for r in [&pending, &running, &done] {
            store.insert(r).await.unwrap();
        }
        let now = Utc::now();
        store.apply(running.id, &LifecycleEvent::Dispatched { attempt: 2 }, now).await.unwrap();
        store
            .apply(done.id, &LifecycleEvent::Completed { attempt: 1, result: serde_json::json!({}) }, now)
            .await
            .unwrap();

        let mut ids: Vec<JobId> = store.list_open().await.unwrap().iter().map(|r| r.id).collect();
        ids.sort();
        let mut want = vec![pending.id, running.id];
        want.sort();
        assert_eq!(ids, want);
    }

    #[tokio::test]
    async fn outage_and_injected_failures() {
        let store = InMemoryJobStore::new();
        let r = record();

        store.set_available(false);
        assert!(matches!(store.insert(&r).await, Err(StoreError::Unavailable(_))));
        store.set_available(true);

        store.fail_next(2);
        assert!(store.insert(&r).await.is_err());
        assert!(store.insert(&r).await.is_err());
        store.insert(&r).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
