//! In-memory broker implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::entry::{EntryState, QueueEntry};
use super::lane::{LaneQueue, Scheduled};
use crate::domain::{JobId, Priority};
use crate::observability::LaneCounts;
use crate::ports::{Broker, BrokerError, Delivery, EnqueueOutcome, JobDescriptor};

struct BrokerState {
    /// Every outstanding job, across both lanes. Also the dedup index.
    entries: HashMap<JobId, QueueEntry>,
    high: LaneQueue,
    default: LaneQueue,
    closed: bool,
}

impl BrokerState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            high: LaneQueue::default(),
            default: LaneQueue::default(),
            closed: false,
        }
    }

    fn lane_mut(&mut self, lane: Priority) -> &mut LaneQueue {
        match lane {
            Priority::High => &mut self.high,
            Priority::Default => &mut self.default,
        }
    }

    fn lane(&self, lane: Priority) -> &LaneQueue {
        match lane {
            Priority::High => &self.high,
            Priority::Default => &self.default,
        }
    }

    /// Move delayed entries whose time has come to the back of the ready list.
    fn promote_due(&mut self, lane: Priority, now: Instant) {
        let due = self.lane_mut(lane).take_due(now);
        for id in due {
            if let Some(entry) = self.entries.get_mut(&id)
                && entry.state == EntryState::Delayed
            {
                entry.requeue();
                self.lane_mut(lane).ready.push_back(id);
            }
        }
    }

    fn dispatch_next(&mut self, lane: Priority) -> Option<Delivery> {
        while let Some(id) = self.lane_mut(lane).ready.pop_front() {
            if let Some(entry) = self.entries.get_mut(&id)
                && entry.state == EntryState::Queued
            {
                return Some(entry.dispatch());
            }
        }
        None
    }

    /// Remove an in-flight entry, returning its lane.
    fn remove_in_flight(&mut self, id: JobId) -> Result<Priority, BrokerError> {
        let entry = self.entries.get(&id).ok_or(BrokerError::UnknownJob(id))?;
        if entry.state != EntryState::InFlight {
            return Err(BrokerError::NotInFlight(id));
        }
        let lane = entry.descriptor.priority;
        self.entries.remove(&id);
        Ok(lane)
    }

    fn counts(&self, lane: Priority) -> LaneCounts {
        let mut counts = LaneCounts {
            dead: self.lane(lane).dead.len(),
            ..LaneCounts::default()
        };
        for entry in self.entries.values() {
            if entry.descriptor.priority != lane {
                continue;
            }
            match entry.state {
                EntryState::Queued => counts.queued += 1,
                EntryState::Delayed => counts.delayed += 1,
                EntryState::InFlight => counts.in_flight += 1,
            }
        }
        counts
    }
}

/// Single-process broker with two lanes behind one lock.
///
/// The lock is never held across an await of anything but itself, so the
/// critical sections are short and one lane never waits on the other's work.
/// Each lane has its own `Notify` so an enqueue only wakes workers of its lane.
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
    high: Notify,
    default: Notify,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BrokerState::new()),
            high: Notify::new(),
            default: Notify::new(),
        }
    }

    fn notify(&self, lane: Priority) -> &Notify {
        match lane {
            Priority::High => &self.high,
            Priority::Default => &self.default,
        }
    }

    /// Last dead-lettered errors of a lane, oldest first.
    pub async fn dead_letters(&self, lane: Priority) -> Vec<(JobId, String)> {
        let state = self.state.lock().await;
        state.lane(lane).dead.iter().cloned().collect()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<EnqueueOutcome, BrokerError> {
        let lane = descriptor.priority;
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(BrokerError::Closed);
            }
            if state.entries.contains_key(&descriptor.id) {
                return Ok(EnqueueOutcome::Duplicate);
            }
            let id = descriptor.id;
            state.entries.insert(id, QueueEntry::new(descriptor));
            state.lane_mut(lane).ready.push_back(id);
        }

        self.notify(lane).notify_one();
        Ok(EnqueueOutcome::Accepted)
    }

    async fn dequeue(&self, lane: Priority) -> Option<Delivery> {
        loop {
            // Register interest before looking, so a notification that lands
            // between the check and the wait is not lost.
            let notified = self.notify(lane).notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_wake = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return None;
                }
                state.promote_due(lane, Instant::now());
                if let Some(delivery) = state.dispatch_next(lane) {
                    return Some(delivery);
                }
                state.lane(lane).next_visible_at()
            };

            match next_wake {
                Some(wake_at) => {
                    tokio::select! {
                        _ = &mut notified => {},
                        _ = tokio::time::sleep_until(wake_at) => {},
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn reschedule(&self, id: JobId, delay: Duration) -> Result<(), BrokerError> {
        let lane = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(BrokerError::Closed);
            }
            let entry = state.entries.get_mut(&id).ok_or(BrokerError::UnknownJob(id))?;
            if entry.state != EntryState::InFlight {
                return Err(BrokerError::NotInFlight(id));
            }

            let visible_at = Instant::now() + delay;
            entry.delay_until(visible_at);
            let lane = entry.descriptor.priority;
            state.lane_mut(lane).delayed.push(Scheduled { visible_at, id });
            lane
        };

        // A waiting worker may be sleeping towards a later wake time.
        self.notify(lane).notify_one();
        Ok(())
    }

    async fn ack(&self, id: JobId) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        state.remove_in_flight(id)?;
        Ok(())
    }

    async fn nack(&self, id: JobId, error: String) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let lane = state.remove_in_flight(id)?;
        state.lane_mut(lane).bury(id, error);
        Ok(())
    }

    async fn counts(&self, lane: Priority) -> LaneCounts {
        let state = self.state.lock().await;
        state.counts(lane)
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
        self.high.notify_waiters();
        self.default.notify_waiters();
    }
}
