//! Priority queue broker: lane structures, retry policy, in-memory implementation.

mod entry;
mod lane;
mod memory;
mod retry;

pub use entry::{EntryState, QueueEntry};
pub use lane::DEAD_LETTER_LIMIT;
pub use memory::InMemoryBroker;
pub use retry::RetryPolicy;
