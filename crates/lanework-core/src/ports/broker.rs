//! Broker port: priority lanes of dispatchable jobs.
//!
//! The broker owns transient queue membership (position, visibility, delay
//! timer, attempts made). It does not own business data beyond what is needed
//! to dispatch: id, type, priority, payload and the retry ceiling.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{JobId, JobRecord, JobStatus, Priority};
use crate::observability::LaneCounts;

/// What the broker keeps about a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub id: JobId,
    pub job_type: String,
    pub priority: Priority,
    pub payload: serde_json::Value,
    pub max_attempts: u32,
    /// Attempts already finished before this enqueue. Zero for a new job.
    pub attempts_made: u32,
}

impl From<&JobRecord> for JobDescriptor {
    /// A `processing` record was interrupted while running its recorded
    /// attempt, so that attempt is handed out again under the same number.
    fn from(record: &JobRecord) -> Self {
        let attempts_made = match record.status {
            JobStatus::Processing => record.attempts.saturating_sub(1),
            _ => record.attempts,
        };
        Self {
            id: record.id,
            job_type: record.job_type.clone(),
            priority: record.priority,
            payload: record.payload.clone(),
            max_attempts: record.max_attempts,
            attempts_made: attempts_made.min(record.max_attempts.saturating_sub(1)),
        }
    }
}

/// A job handed to a worker, with the attempt number it is about to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub descriptor: JobDescriptor,
    /// 1-indexed attempt number of this dispatch.
    pub attempt: u32,
}

impl Delivery {
    pub fn id(&self) -> JobId {
        self.descriptor.id
    }

    pub fn job_type(&self) -> &str {
        &self.descriptor.job_type
    }

    pub fn lane(&self) -> Priority {
        self.descriptor.priority
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    /// The id is already queued, delayed or in flight; nothing changed.
    Duplicate,
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker is closed")]
    Closed,

    #[error("job {0} is not known to the broker")]
    UnknownJob(JobId),

    #[error("job {0} is not in flight")]
    NotInFlight(JobId),
}

/// Two independent lanes keyed by priority, deduplicated by job id.
///
/// All methods are safe to call concurrently from producers and workers.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Route `descriptor` to the lane of its priority. A second enqueue of an
    /// outstanding id is a no-op reported as [`EnqueueOutcome::Duplicate`].
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<EnqueueOutcome, BrokerError>;

    /// Wait until a job is visible in `lane` and dispatch it. Returns `None`
    /// once the broker is closed.
    ///
    /// Cancel-safe: dropping the future before it resolves dispatches nothing.
    async fn dequeue(&self, lane: Priority) -> Option<Delivery>;

    /// Put an in-flight job back into its lane, invisible until `delay` has
    /// elapsed. Counts the attempt that just ran.
    async fn reschedule(&self, id: JobId, delay: Duration) -> Result<(), BrokerError>;

    /// Final removal after success. Releases the dedup key.
    async fn ack(&self, id: JobId) -> Result<(), BrokerError>;

    /// Final removal after terminal failure. Releases the dedup key and keeps
    /// the error in the lane's dead-letter list.
    async fn nack(&self, id: JobId, error: String) -> Result<(), BrokerError>;

    async fn counts(&self, lane: Priority) -> LaneCounts;

    /// Stop dispatching: pending and future `dequeue` calls return `None`.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifecycleEvent, NewJob};
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn record_after(events: &[LifecycleEvent]) -> JobRecord {
        let mut record = JobRecord::new(
            JobId::from_ulid(Ulid::new()),
            NewJob::new("CSV_EXPORT", serde_json::json!({})),
            Utc::now(),
        );
        for event in events {
            record.apply(event, Utc::now());
        }
        record
    }

    #[rstest]
    #[case::new_job(vec![], 0)]
    #[case::interrupted_first_attempt(vec![LifecycleEvent::Dispatched { attempt: 1 }], 0)]
    #[case::interrupted_second_attempt(vec![LifecycleEvent::Dispatched { attempt: 2 }], 1)]
    #[case::interrupted_last_attempt(vec![LifecycleEvent::Dispatched { attempt: 3 }], 2)]
    fn descriptor_resumes_the_unfinished_attempt(
        #[case] events: Vec<LifecycleEvent>,
        #[case] attempts_made: u32,
    ) {
        let record = record_after(&events);
        let descriptor = JobDescriptor::from(&record);
        assert_eq!(descriptor.attempts_made, attempts_made);
        assert_eq!(descriptor.max_attempts, record.max_attempts);
    }
}
