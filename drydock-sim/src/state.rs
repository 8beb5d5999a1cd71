//! Simulation state protected by the core mutex.
//!
//! Everything mutable in the harness lives in [`SimState`] behind a single
//! `parking_lot::Mutex`; the two condition variables in the owning network
//! type are the only other synchronization primitives. The role tag and
//! waiting set here are what serialize the executor thread and the network
//! thread into one deterministic interleaving.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use drydock_core::{CallbackId, CommandStatus, HostAndPort, RemoteReply};

use crate::alarm::AlarmQueue;
use crate::clock::VirtualClock;
use crate::operation::{NetworkOperation, OperationId};
use crate::response::{ResponseQueue, ScheduledResponse};

/// Which participant, if any, is logically executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadRole {
    /// Both participants are suspended.
    None,
    /// The executor under test is running.
    Executor,
    /// The network (test driver) is running.
    Network,
}

/// Which participants are waiting to run.
///
/// The executor flag doubles as the *work available* token: `wait_for_work`
/// consumes a pending flag without parking, and the network's dispatch loop
/// only hands control back when the flag is raised.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WaitingSet {
    pub(crate) executor: bool,
    pub(crate) network: bool,
}

/// All mutable simulation state.
#[derive(Debug)]
pub(crate) struct SimState {
    pub(crate) clock: VirtualClock,

    /// Append-only arena of submitted operations. Never shrinks, so
    /// [`OperationId`]s held by the driver never dangle.
    pub(crate) operations: Vec<NetworkOperation>,

    /// Responses awaiting delivery, ordered by delivery time.
    pub(crate) responses: ResponseQueue,

    /// Pending alarms plus their cancellation set.
    pub(crate) alarms: AlarmQueue,

    /// Hosts whose handshake has completed.
    pub(crate) known_hosts: HashSet<HostAndPort>,

    /// Canned handshake replies fed to the connection hook's validator.
    pub(crate) handshake_replies: HashMap<HostAndPort, RemoteReply>,

    pub(crate) currently_running: ThreadRole,
    pub(crate) waiting: WaitingSet,

    /// Next virtual time the parked executor expects to wake at.
    /// `Duration::MAX` while no timed wait is in progress.
    pub(crate) executor_next_wakeup: Duration,

    /// Set by `startup()`.
    pub(crate) has_started: bool,
}

impl SimState {
    pub(crate) fn new(epoch: Duration) -> Self {
        Self {
            clock: VirtualClock::new(epoch),
            operations: Vec::new(),
            responses: ResponseQueue::new(),
            alarms: AlarmQueue::new(),
            known_hosts: HashSet::new(),
            handshake_replies: HashMap::new(),
            currently_running: ThreadRole::None,
            waiting: WaitingSet::default(),
            executor_next_wakeup: Duration::MAX,
            has_started: false,
        }
    }

    /// The network may run when nobody is running and it holds the next
    /// turn. Before `startup()` the role is freely claimable, so
    /// driver-only tests can enter without an executor ever parking.
    pub(crate) fn is_network_runnable(&self) -> bool {
        self.currently_running == ThreadRole::None && (self.waiting.network || !self.has_started)
    }

    /// The executor may run when nobody is running and work (or a deadline,
    /// or shutdown) has raised its flag.
    pub(crate) fn is_executor_runnable(&self) -> bool {
        self.currently_running == ThreadRole::None && self.waiting.executor
    }

    /// Whether any operation is still observable via `next_ready_request`.
    pub(crate) fn has_ready_requests(&self) -> bool {
        self.operations.iter().any(NetworkOperation::has_ready_request)
    }

    /// Index of the nth unscheduled operation, if that many exist.
    pub(crate) fn nth_unscheduled(&self, n: usize) -> Option<OperationId> {
        self.operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.has_ready_request())
            .nth(n)
            .map(|(idx, _)| OperationId(idx))
    }

    /// Append an operation to the arena, returning its stable id.
    pub(crate) fn push_operation(&mut self, op: NetworkOperation) -> OperationId {
        let id = OperationId(self.operations.len());
        self.operations.push(op);
        id
    }

    /// Queue `status` for delivery to `id` at `when`, updating the
    /// operation's lifecycle flags. A reply is terminal unless the
    /// operation is an exhaust command and the reply says more will come.
    pub(crate) fn queue_response(&mut self, id: OperationId, when: Duration, status: CommandStatus) {
        let op = &mut self.operations[id.0];
        let terminal = match &status {
            Err(_) => true,
            Ok(reply) => !(op.is_exhaust() && reply.more_to_come),
        };
        op.mark_processing();
        if terminal {
            op.mark_scheduled();
        }
        tracing::debug!(
            operation = %id,
            when_ms = when.as_millis() as u64,
            terminal,
            "queueing response"
        );
        self.responses.insert(ScheduledResponse {
            operation: id,
            deliver_at: when,
            status,
        });
    }

    /// Deliver `status` to the first unfinished operation registered for
    /// `handle`, unless a terminal response is already queued (the
    /// interruption loses the race) or the operation is blackholed (only
    /// shutdown finalizes those). Used by cancellation and timeouts.
    pub(crate) fn interrupt_with_response(&mut self, handle: CallbackId, status: CommandStatus) {
        let now = self.clock.now();
        let found = self
            .operations
            .iter()
            .position(|op| op.callback_id() == handle && !op.is_finished());
        let Some(idx) = found else {
            return;
        };
        let op = &self.operations[idx];
        if op.is_scheduled() || op.is_blackholed() {
            tracing::debug!(
                operation = %OperationId(idx),
                state = op.state_name(),
                "interruption lost the race"
            );
            return;
        }
        self.queue_response(OperationId(idx), now, status);
    }
}
