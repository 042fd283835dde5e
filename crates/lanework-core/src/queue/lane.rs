//! Per-lane queue structures.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use tokio::time::Instant;

use crate::domain::JobId;

/// Dead-letter entries kept per lane.
pub const DEAD_LETTER_LIMIT: usize = 1000;

/// Delay-heap entry.
///
/// Ordering is reversed so `BinaryHeap` pops the earliest `visible_at` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub visible_at: Instant,
    pub id: JobId,
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .visible_at
            .cmp(&self.visible_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// One lane: FIFO of visible ids, heap of delayed ids, dead letters.
#[derive(Debug, Default)]
pub struct LaneQueue {
    pub ready: VecDeque<JobId>,
    pub delayed: BinaryHeap<Scheduled>,
    pub dead: VecDeque<(JobId, String)>,
}

impl LaneQueue {
    /// Pop delayed ids whose time has come, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<JobId> {
        let mut due = Vec::new();
        while let Some(entry) = self.delayed.peek() {
            if entry.visible_at > now {
                break;
            }
            if let Some(entry) = self.delayed.pop() {
                due.push(entry.id);
            }
        }
        due
    }

    pub fn next_visible_at(&self) -> Option<Instant> {
        self.delayed.peek().map(|entry| entry.visible_at)
    }

    pub fn bury(&mut self, id: JobId, error: String) {
        if self.dead.len() == DEAD_LETTER_LIMIT {
            self.dead.pop_front();
        }
        self.dead.push_back((id, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use ulid::Ulid;

    fn id() -> JobId {
        JobId::from_ulid(Ulid::new())
    }

    #[test]
    fn take_due_returns_only_elapsed_entries_in_time_order() {
        let now = Instant::now();
        let (a, b, c) = (id(), id(), id());
        let mut lane = LaneQueue::default();
        lane.delayed.push(Scheduled { visible_at: now + Duration::from_secs(2), id: a });
        lane.delayed.push(Scheduled { visible_at: now, id: b });
        lane.delayed.push(Scheduled { visible_at: now + Duration::from_secs(1), id: c });

        assert_eq!(lane.take_due(now + Duration::from_secs(1)), vec![b, c]);
        assert_eq!(lane.next_visible_at(), Some(now + Duration::from_secs(2)));
    }

    #[test]
    fn dead_letters_are_bounded() {
        let mut lane = LaneQueue::default();
        let first = id();
        lane.bury(first, "first".into());
        for _ in 0..DEAD_LETTER_LIMIT {
            lane.bury(id(), "later".into());
        }
        assert_eq!(lane.dead.len(), DEAD_LETTER_LIMIT);
        assert!(lane.dead.iter().all(|(dead, _)| *dead != first));
    }
}
