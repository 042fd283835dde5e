use serde::{Deserialize, Serialize};

/// Snapshot of one lane's membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneCounts {
    /// Visible and waiting for a worker.
    pub queued: usize,
    /// Waiting out a backoff delay.
    pub delayed: usize,
    /// Dispatched and not yet acked, nacked or rescheduled.
    pub in_flight: usize,
    /// Kept in the dead-letter list after `nack`.
    pub dead: usize,
}

impl LaneCounts {
    /// Jobs the lane still owns (dedup keys held).
    pub fn outstanding(&self) -> usize {
        self.queued + self.delayed + self.in_flight
    }
}
