//! Impls - job store implementations.
//!
//! - **InMemoryJobStore**: development and tests; can simulate an outage
//! - **SqliteJobStore**: durable store on sqlx/SQLite

pub mod memory_store;
pub mod sqlite_store;

pub use self::memory_store::InMemoryJobStore;
pub use self::sqlite_store::SqliteJobStore;
