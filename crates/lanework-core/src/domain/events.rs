//! Lifecycle events applied by the status reconciler.

use super::JobStatus;

/// An event produced by a worker for one job.
///
/// Every event carries the attempt number it belongs to so that a store that
/// missed an earlier write still ends up with the right `attempts` value.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The job was handed to a handler for attempt number `attempt` (1-indexed).
    Dispatched { attempt: u32 },

    /// The handler returned a result.
    Completed {
        attempt: u32,
        result: serde_json::Value,
    },

    /// The job failed terminally (retries exhausted or not retryable).
    Failed { attempt: u32, error: String },
}

impl LifecycleEvent {
    pub fn attempt(&self) -> u32 {
        match self {
            LifecycleEvent::Dispatched { attempt }
            | LifecycleEvent::Completed { attempt, .. }
            | LifecycleEvent::Failed { attempt, .. } => *attempt,
        }
    }

    /// Status the record moves to when this event is applied.
    pub fn target_status(&self) -> JobStatus {
        match self {
            LifecycleEvent::Dispatched { .. } => JobStatus::Processing,
            LifecycleEvent::Completed { .. } => JobStatus::Completed,
            LifecycleEvent::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Dispatched { .. } => "dispatched",
            LifecycleEvent::Completed { .. } => "completed",
            LifecycleEvent::Failed { .. } => "failed",
        }
    }
}
