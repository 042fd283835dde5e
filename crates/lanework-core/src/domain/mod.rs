//! Domain model: identifiers, job records, lifecycle, failures and retry decisions.

pub mod decision;
pub mod errors;
pub mod events;
pub mod ids;
pub mod job;
pub mod priority;
pub mod state;

pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{ErrorKind, ExecutionError};
pub use events::LifecycleEvent;
pub use ids::{JobId, ParseIdError};
pub use job::{ApplyOutcome, DEFAULT_MAX_ATTEMPTS, JobRecord, JobView, NewJob};
pub use priority::{ParsePriorityError, Priority};
pub use state::JobStatus;
