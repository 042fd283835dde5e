//! Queue entry: broker-side metadata for one outstanding job.

use tokio::time::Instant;

use crate::ports::{Delivery, JobDescriptor};

/// Where an entry sits in its lane.
///
/// State transitions:
/// - Queued -> InFlight (dequeue)
/// - InFlight -> Delayed -> Queued (reschedule, then the delay elapses)
/// - InFlight -> removed (ack / nack)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Visible to `dequeue`.
    Queued,

    /// Invisible until `visible_at`.
    Delayed,

    /// Handed to a worker.
    InFlight,
}

/// Broker-side record of an outstanding job.
///
/// The lane structures (ready list, delay heap) hold ids only; state changes
/// happen here.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub descriptor: JobDescriptor,
    pub state: EntryState,

    /// Attempts that have finished (failed and were rescheduled).
    pub attempts_made: u32,

    /// When a delayed entry becomes visible.
    pub visible_at: Option<Instant>,

    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(descriptor: JobDescriptor) -> Self {
        Self {
            attempts_made: descriptor.attempts_made,
            descriptor,
            state: EntryState::Queued,
            visible_at: None,
            enqueued_at: Instant::now(),
        }
    }

    /// Mark as handed to a worker and build the delivery for it.
    pub fn dispatch(&mut self) -> Delivery {
        self.state = EntryState::InFlight;
        Delivery {
            descriptor: self.descriptor.clone(),
            attempt: self.attempts_made + 1,
        }
    }

    /// Count the attempt that just ran and hide the entry until `visible_at`.
    pub fn delay_until(&mut self, visible_at: Instant) {
        self.attempts_made += 1;
        self.state = EntryState::Delayed;
        self.visible_at = Some(visible_at);
    }

    /// Delay elapsed: visible again.
    pub fn requeue(&mut self) {
        self.state = EntryState::Queued;
        self.visible_at = None;
    }
}
