//! Scheduled responses, ordered by delivery time.

use std::collections::VecDeque;
use std::time::Duration;

use drydock_core::CommandStatus;

use crate::operation::OperationId;

/// A reply (or error) queued for delivery at a virtual time.
#[derive(Debug)]
pub(crate) struct ScheduledResponse {
    /// Operation this response answers.
    pub(crate) operation: OperationId,
    /// Virtual time at which the dispatch loop delivers it.
    pub(crate) deliver_at: Duration,
    /// Outcome handed to the operation's continuation.
    pub(crate) status: CommandStatus,
}

/// Queue of pending responses, kept sorted by `deliver_at`.
///
/// Insertion is a linear scan to the first later entry, so responses
/// scheduled for the same time keep their scheduling order (FIFO
/// tie-break). The dispatch loop drains strictly from the front.
#[derive(Debug, Default)]
pub(crate) struct ResponseQueue {
    entries: VecDeque<ScheduledResponse>,
}

impl ResponseQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Insert in delivery order, after any entry with the same time.
    pub(crate) fn insert(&mut self, response: ScheduledResponse) {
        let at = self
            .entries
            .iter()
            .position(|existing| existing.deliver_at > response.deliver_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, response);
    }

    /// Pop the front entry if it is due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<ScheduledResponse> {
        if self.entries.front()?.deliver_at <= now {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Delivery time of the earliest pending response.
    pub(crate) fn next_deliver_at(&self) -> Option<Duration> {
        self.entries.front().map(|r| r.deliver_at)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop every pending response. Used at shutdown, where undelivered
    /// replies are superseded by synthetic cancellations.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
