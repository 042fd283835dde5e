//! lanework-core
//!
//! Background job engine: two priority lanes, at-least-once delivery with
//! exponential backoff, per-lane worker pools and a durable status record.
//!
//! # Modules
//! - **domain**: job record, lifecycle, identifiers, failures, retry decisions
//! - **ports**: `Broker`, `JobStore`, `Clock`, `IdGenerator`
//! - **queue**: in-memory broker and retry policy
//! - **impls**: job stores (in-memory, SQLite)
//! - **typed**: typed handler API and registry
//! - **handlers**: `CSV_EXPORT`, `EMAIL_SEND`
//! - **app**: builder, submission service, worker pools, status reconciler

pub mod app;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod runtime;
pub mod typed;

pub use crate::error::LaneworkError;
