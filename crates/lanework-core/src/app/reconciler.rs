//! StatusReconciler - applies lifecycle events to the job store.
//!
//! Store failures never reach the worker: they are logged and the queue-side
//! outcome proceeds regardless. How hard to try before giving up is the
//! [`StoreWritePolicy`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{ApplyOutcome, JobId, LifecycleEvent};
use crate::ports::{Clock, JobStore};

/// How many times a status write is tried, and the pause between tries.
///
/// `attempts = 1` is best effort: one try, then the update is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreWritePolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl StoreWritePolicy {
    pub fn best_effort() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn retrying(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl Default for StoreWritePolicy {
    fn default() -> Self {
        Self::best_effort()
    }
}

pub struct StatusReconciler {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    policy: StoreWritePolicy,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, policy: StoreWritePolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> StoreWritePolicy {
        self.policy
    }

    /// Apply `event` to job `id`. Returns `None` when every try failed.
    pub async fn apply(&self, id: JobId, event: &LifecycleEvent) -> Option<ApplyOutcome> {
        let tries = self.policy.attempts.max(1);
        for n in 1..=tries {
            match self.store.apply(id, event, self.clock.now()).await {
                Ok(outcome) => {
                    match outcome {
                        ApplyOutcome::Updated => {}
                        ApplyOutcome::Ignored => {
                            debug!(job_id = %id, event = event.name(), "event ignored by terminal record");
                        }
                        ApplyOutcome::Missing => {
                            warn!(job_id = %id, event = event.name(), "no job record for event");
                        }
                    }
                    return Some(outcome);
                }
                Err(err) => {
                    warn!(
                        job_id = %id,
                        event = event.name(),
                        attempt = event.attempt(),
                        write_try = n,
                        error = %err,
                        "failed to update job status"
                    );
                    if n < tries && !self.policy.backoff.is_zero() {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }
        None
    }
}
