//! Typed handler API.
//!
//! Two layers:
//! - **typed**: `TypedJob` and `Handler<T>`; a handler only ever sees its own payload type
//! - **dyn**: `DynHandler`, object-safe, what the registry stores and the runtime calls

pub mod handler;
pub mod job;
pub mod registry;

pub use self::handler::{DynHandler, Handler, JobContext, TypedHandler};
pub use self::job::TypedJob;
pub use self::registry::{HandlerRegistry, RegistryError};
