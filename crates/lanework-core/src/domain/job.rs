//! Job record: the durable state of one job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::LifecycleEvent;
use super::ids::JobId;
use super::priority::Priority;
use super::state::JobStatus;

/// Retry ceiling used when a submission does not choose one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// What a producer asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub job_type: String,
    pub priority: Priority,
    pub payload: serde_json::Value,
    pub max_attempts: u32,
}

impl NewJob {
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            priority: Priority::Default,
            payload,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Result of applying a lifecycle event to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record changed.
    Updated,
    /// The event would leave a terminal state; nothing was written.
    Ignored,
    /// No record with that id.
    Missing,
}

/// Durable job record. The job store owns it; everything else works on copies.
///
/// Invariants:
/// - `attempts` never decreases and never exceeds `max_attempts`
/// - `status` only moves along [`JobStatus::can_transition_to`]
/// - terminal records carry exactly one of `result` / `error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub job_type: String,
    pub priority: Priority,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: JobId, job: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id,
            job_type: job.job_type,
            priority: job.priority,
            payload: job.payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: job.max_attempts,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a lifecycle event.
    ///
    /// Attempts are written last-value-wins, floored by the recorded value, so
    /// redelivering the same event is harmless.
    pub fn apply(&mut self, event: &LifecycleEvent, at: DateTime<Utc>) -> ApplyOutcome {
        let next = event.target_status();
        if !self.status.can_transition_to(next) {
            return ApplyOutcome::Ignored;
        }

        match event {
            LifecycleEvent::Dispatched { .. } => {}
            LifecycleEvent::Completed { result, .. } => {
                self.result = Some(normalize_result(result.clone()));
                self.error = None;
            }
            LifecycleEvent::Failed { error, .. } => {
                self.result = None;
                self.error = Some(error.clone());
            }
        }

        self.attempts = clamp_attempts(self.attempts, event.attempt(), self.max_attempts);
        self.status = next;
        self.updated_at = at;
        ApplyOutcome::Updated
    }

    pub fn view(&self) -> JobView {
        JobView::from(self)
    }
}

/// Attempt count after observing `reported`: never lower than `recorded`,
/// never higher than `max_attempts`.
pub fn clamp_attempts(recorded: u32, reported: u32, max_attempts: u32) -> u32 {
    reported.min(max_attempts).max(recorded)
}

/// A handler returning JSON null still has to leave a non-null result behind,
/// so null is recorded as an empty object.
pub fn normalize_result(value: serde_json::Value) -> serde_json::Value {
    if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value
    }
}

/// Externally visible shape of a job, as returned by `GET /jobs/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub priority: Priority,
    pub attempts: u32,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&JobRecord> for JobView {
    fn from(record: &JobRecord) -> Self {
        Self {
            id: record.id,
            job_type: record.job_type.clone(),
            status: record.status,
            priority: record.priority,
            attempts: record.attempts,
            result: record.result.clone(),
            error: record.error.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
