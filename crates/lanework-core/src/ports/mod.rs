//! Ports: the seams between the engine and its collaborators.
//!
//! - `Broker`: lane queues (in-memory here; a shared external queue in a
//!   multi-process deployment)
//! - `JobStore`: durable record of job status (source of truth for producers)
//! - `Clock` / `IdGenerator`: injected so tests can pin time and ids

pub mod broker;
pub mod clock;
pub mod id_generator;
pub mod job_store;

pub use self::broker::{Broker, BrokerError, Delivery, EnqueueOutcome, JobDescriptor};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::{JobStore, StoreError};
