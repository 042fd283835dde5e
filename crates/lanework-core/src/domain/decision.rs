//! Retry/backoff controller: what happens after a failed attempt.

use std::time::Duration;

use super::errors::{ErrorKind, ExecutionError};
use crate::ports::Delivery;
use crate::queue::RetryPolicy;

/// The next action for a job whose attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Make the job visible again after `delay`. The visible status stays
    /// `processing`.
    Retry { delay: Duration },

    /// Give up and record `error` as the terminal failure.
    Exhausted { error: String },
}

/// Decides the next action for a failed attempt.
///
/// Deciders are pure: they look at the delivery and the failure and return a
/// decision. Carrying it out (rescheduling, writing the record) is the worker's
/// job.
pub trait Decider: Send + Sync {
    fn decide(&self, delivery: &Delivery, error: &ExecutionError) -> Decision;
}

/// Attempt-budget decider with exponential backoff.
///
/// - retry if `attempt < max_attempts`
/// - otherwise exhausted
/// - permanent failures skip the budget unless the policy says otherwise
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, delivery: &Delivery, error: &ExecutionError) -> Decision {
        let permanent = error.kind() == ErrorKind::Permanent;
        if (permanent && !self.retry_policy.retry_permanent)
            || delivery.attempt >= delivery.descriptor.max_attempts
        {
            return Decision::Exhausted {
                error: error.message().to_string(),
            };
        }

        Decision::Retry {
            delay: self.retry_policy.next_delay(delivery.attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, Priority};
    use crate::ports::JobDescriptor;
    use rstest::rstest;
    use ulid::Ulid;

    fn delivery(attempt: u32, max_attempts: u32) -> Delivery {
        Delivery {
            descriptor: JobDescriptor {
                id: JobId::from_ulid(Ulid::new()),
                job_type: "EMAIL_SEND".to_string(),
                priority: Priority::Default,
                payload: serde_json::json!({}),
                max_attempts,
                attempts_made: 0,
            },
            attempt,
        }
    }

    #[rstest]
    #[case::first_failure(1, Duration::from_millis(1000))]
    #[case::second_failure(2, Duration::from_millis(2000))]
    fn retries_with_exponential_backoff(#[case] attempt: u32, #[case] expected: Duration) {
        let decider = DefaultDecider::default();
        let decision = decider.decide(&delivery(attempt, 3), &ExecutionError::transient("smtp down"));
        assert_eq!(decision, Decision::Retry { delay: expected });
    }

    #[test]
    fn exhausted_on_last_attempt_with_last_message() {
        let decider = DefaultDecider::default();
        let decision = decider.decide(&delivery(3, 3), &ExecutionError::transient("third failure"));
        assert_eq!(
            decision,
            Decision::Exhausted {
                error: "third failure".to_string()
            }
        );
    }

    #[test]
    fn permanent_failure_is_terminal_by_default() {
        let decider = DefaultDecider::default();
        let err = ExecutionError::unknown_job_type("DOES_NOT_EXIST");
        assert_eq!(
            decider.decide(&delivery(1, 3), &err),
            Decision::Exhausted {
                error: "Unknown job type: DOES_NOT_EXIST".to_string()
            }
        );
    }

    // Coarse policy: permanent failures spend the normal retry budget.
    #[test]
    fn permanent_failure_retries_when_policy_allows() {
        let decider = DefaultDecider::new(RetryPolicy::default().with_retry_permanent(true));
        let err = ExecutionError::unknown_job_type("DOES_NOT_EXIST");
        assert!(matches!(
            decider.decide(&delivery(1, 3), &err),
            Decision::Retry { .. }
        ));
        assert!(matches!(
            decider.decide(&delivery(3, 3), &err),
            Decision::Exhausted { .. }
        ));
    }

    #[test]
    fn single_attempt_budget_never_retries() {
        let decider = DefaultDecider::default();
        assert!(matches!(
            decider.decide(&delivery(1, 1), &ExecutionError::transient("x")),
            Decision::Exhausted { .. }
        ));
    }
}
