//! Alarms scheduled against virtual time.
//!
//! Alarms live in a min-heap keyed by fire time, with a sequence number so
//! that alarms set for the same instant fire in the order they were set.
//! Cancellation is recorded in a separate set and applied lazily when an
//! alarm reaches the top of the heap.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use drydock_core::{AlarmAction, CallbackId};

/// A scheduled alarm.
pub(crate) struct Alarm {
    /// Handle the executor may use to cancel this alarm.
    pub(crate) handle: CallbackId,
    /// Virtual time at which the action runs.
    pub(crate) fire_at: Duration,
    /// Action to invoke, with success status, once due.
    pub(crate) action: AlarmAction,
    sequence: u64,
}

impl PartialEq for Alarm {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.sequence == other.sequence
    }
}

impl Eq for Alarm {}

impl PartialOrd for Alarm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Alarm {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap, but the earliest alarm must surface
        // first, so both comparisons are reversed. Sequence numbers keep
        // same-instant alarms in FIFO order.
        match other.fire_at.cmp(&self.fire_at) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

impl std::fmt::Debug for Alarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alarm")
            .field("handle", &self.handle)
            .field("fire_at", &self.fire_at)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Min-heap of alarms plus the set of cancelled handles.
#[derive(Debug, Default)]
pub(crate) struct AlarmQueue {
    heap: BinaryHeap<Alarm>,
    cancelled: HashSet<CallbackId>,
    next_sequence: u64,
}

impl AlarmQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedule an action to run at `fire_at`.
    pub(crate) fn schedule(&mut self, handle: CallbackId, fire_at: Duration, action: AlarmAction) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Alarm {
            handle,
            fire_at,
            action,
            sequence,
        });
    }

    /// Record a cancellation. The alarm is dropped when it surfaces.
    pub(crate) fn cancel(&mut self, handle: CallbackId) {
        self.cancelled.insert(handle);
    }

    /// Pop the next live alarm due at or before `now`, discarding cancelled
    /// alarms along the way.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<Alarm> {
        while let Some(top) = self.heap.peek() {
            if top.fire_at > now {
                return None;
            }
            let alarm = self.heap.pop()?;
            if self.cancelled.remove(&alarm.handle) {
                tracing::trace!(handle = %alarm.handle, "discarding cancelled alarm");
                continue;
            }
            return Some(alarm);
        }
        None
    }

    /// Fire time of the earliest pending alarm, cancelled or not.
    ///
    /// A cancelled alarm at the top may cause time to advance to its fire
    /// point, where the pop discards it without running anything.
    pub(crate) fn next_fire_at(&self) -> Option<Duration> {
        self.heap.peek().map(|a| a.fire_at)
    }

    /// Take every remaining live alarm, in fire order. Used at shutdown.
    pub(crate) fn drain_live(&mut self) -> Vec<Alarm> {
        let mut live = Vec::new();
        while let Some(alarm) = self.heap.pop() {
            if self.cancelled.remove(&alarm.handle) {
                continue;
            }
            live.push(alarm);
        }
        live
    }

    /// Whether any non-cancelled alarm remains queued.
    pub(crate) fn has_live(&self) -> bool {
        self.heap.iter().any(|a| !self.cancelled.contains(&a.handle))
    }

    /// Number of alarms still queued, including cancelled ones not yet
    /// discarded.
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }
}
