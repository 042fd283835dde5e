//! App - application layer.
//!
//! Combines the ports into the running engine.
//!
//! # Components
//! - **AppBuilder**: wiring, startup validation, lifecycle
//! - **JobService**: producer-side submit and lookup
//! - **WorkerPool**: per-lane dequeue → execute → decide → reconcile loop
//! - **StatusReconciler**: lifecycle writes to the job store

pub mod builder;
pub mod reconciler;
pub mod submit;
pub mod worker_loop;

pub use self::builder::{App, AppBuilder, BuildError, RunningApp};
pub use self::reconciler::{StatusReconciler, StoreWritePolicy};
pub use self::submit::{JobService, SubmitRequest};
pub use self::worker_loop::{WorkerContext, WorkerPool};
