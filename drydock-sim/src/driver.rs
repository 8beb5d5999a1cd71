//! Driver API: the operations available to the thread simulating the
//! network.
//!
//! Everything here requires the caller to hold the network role (via
//! [`SimNetwork::enter_network`] or [`crate::InNetworkGuard`]). Calling a
//! driver operation without the role, scheduling a response in the past, or
//! responding to a blackholed operation are test-author errors and panic.

use std::time::Duration;

use drydock_core::{CommandStatus, HostAndPort, NetworkError, NetworkInterface, RemoteReply, RemoteRequest};

use crate::net::SimNetwork;
use crate::operation::OperationId;
use crate::state::{SimState, ThreadRole};

fn assert_network_role(state: &SimState, what: &str) {
    assert!(
        state.currently_running == ThreadRole::Network,
        "{what} requires the network role (call enter_network first)"
    );
}

impl SimNetwork {
    /// Assume the network role, blocking until it is free (at startup, or
    /// once the executor has parked in `wait_for_work`).
    ///
    /// Not re-entrant: entering while already holding the role deadlocks.
    pub fn enter_network(&self) {
        let mut guard = self.shared.state.lock();
        while !guard.is_network_runnable() {
            self.shared.wake_network.wait(&mut guard);
        }
        guard.currently_running = ThreadRole::Network;
        guard.waiting.network = false;
        tracing::debug!("network role acquired");
    }

    /// Release the network role. Safe to call without holding it; that is
    /// a no-op.
    pub fn exit_network(&self) {
        let mut guard = self.shared.state.lock();
        if guard.currently_running != ThreadRole::Network {
            return;
        }
        guard.currently_running = ThreadRole::None;
        guard.waiting.network = true;
        if guard.is_executor_runnable() {
            self.shared.wake_executor.notify_one();
        }
        tracing::debug!("network role released");
    }

    /// Whether any submitted operation is still observable via
    /// [`SimNetwork::next_ready_request`].
    pub fn has_ready_requests(&self) -> bool {
        let state = self.shared.state.lock();
        assert_network_role(&state, "has_ready_requests");
        state.has_ready_requests()
    }

    /// Take the next unscheduled operation for processing, blocking (and
    /// granting the executor turns) until one is available.
    pub fn next_ready_request(&self) -> OperationId {
        let mut guard = self.shared.state.lock();
        assert_network_role(&guard, "next_ready_request");
        while !guard.has_ready_requests() {
            // Hand the executor a turn; the network resumes once it parks
            // again and re-arms the network bit.
            guard.waiting.executor = true;
            self.run_ready_locked(&mut guard);
        }
        let Some(id) = guard.nth_unscheduled(0) else {
            unreachable!("loop above established a ready request");
        };
        guard.operations[id.0].mark_processing();
        tracing::debug!(operation = %id, "request taken for processing");
        id
    }

    /// Peek at the first unscheduled operation without taking it.
    ///
    /// # Panics
    ///
    /// Panics if there are no unscheduled operations.
    pub fn front_unscheduled_request(&self) -> OperationId {
        self.nth_unscheduled_request(0)
    }

    /// Peek at the nth (0-based) unscheduled operation without taking it.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n + 1` unscheduled operations exist.
    pub fn nth_unscheduled_request(&self, n: usize) -> OperationId {
        let state = self.shared.state.lock();
        assert_network_role(&state, "nth_unscheduled_request");
        match state.nth_unscheduled(n) {
            Some(id) => id,
            None => panic!("fewer than {} unscheduled requests", n + 1),
        }
    }

    /// The request that started an operation.
    pub fn request_for(&self, id: OperationId) -> RemoteRequest {
        let state = self.shared.state.lock();
        assert_network_role(&state, "request_for");
        state.operations[id.0].request().clone()
    }

    /// Virtual time at which an operation was submitted.
    pub fn request_date_for(&self, id: OperationId) -> Duration {
        let state = self.shared.state.lock();
        assert_network_role(&state, "request_date_for");
        state.operations[id.0].request_date()
    }

    /// Schedule `status` as the response to `id`, delivered when virtual
    /// time reaches `when`.
    ///
    /// For exhaust operations a successful reply flagged `more_to_come`
    /// leaves the operation open for further responses; anything else is
    /// terminal.
    ///
    /// # Panics
    ///
    /// Panics without the network role, when `when` is in the past, or when
    /// the operation has been blackholed.
    pub fn schedule_response(&self, id: OperationId, when: Duration, status: CommandStatus) {
        let mut state = self.shared.state.lock();
        assert_network_role(&state, "schedule_response");
        let now = state.clock.now();
        assert!(
            when >= now,
            "response scheduled in the past ({when:?} < {now:?})"
        );
        assert!(
            !state.operations[id.0].is_blackholed(),
            "response scheduled for a blackholed operation"
        );
        let mut status = status;
        if let Ok(reply) = &mut status
            && let Some(hook) = self.metadata_hook()
        {
            let target = state.operations[id.0].request().target.clone();
            if let Err(error) = hook.write_metadata(&target, &mut reply.metadata) {
                panic!("metadata hook failed for {target}: {error}");
            }
        }
        state.queue_response(id, when, status);
    }

    /// Schedule a successful `reply` for the next ready request at the
    /// current time, returning the request it answers.
    pub fn schedule_successful_response(&self, reply: RemoteReply) -> RemoteRequest {
        let id = self.next_ready_request();
        self.schedule_successful_response_at(id, self.now(), reply)
    }

    /// Schedule a successful `reply` for `id` at `when`, returning the
    /// request it answers.
    pub fn schedule_successful_response_at(
        &self,
        id: OperationId,
        when: Duration,
        reply: RemoteReply,
    ) -> RemoteRequest {
        let request = self.request_for(id);
        self.schedule_response(id, when, Ok(reply));
        request
    }

    /// Schedule `error` for the next ready request at the current time,
    /// returning the request it answers.
    pub fn schedule_error_response(&self, error: NetworkError) -> RemoteRequest {
        let id = self.next_ready_request();
        self.schedule_error_response_at(id, self.now(), error)
    }

    /// Schedule `error` for `id` at `when`, returning the request it
    /// answers.
    pub fn schedule_error_response_at(
        &self,
        id: OperationId,
        when: Duration,
        error: NetworkError,
    ) -> RemoteRequest {
        let request = self.request_for(id);
        self.schedule_response(id, when, Err(error));
        request
    }

    /// Swallow an operation: it will never be responded to. Shutdown is
    /// the only thing that finalizes it, with a cancellation.
    pub fn black_hole(&self, id: OperationId) {
        let mut state = self.shared.state.lock();
        assert_network_role(&state, "black_hole");
        tracing::debug!(operation = %id, "blackholing operation");
        state.operations[id.0].mark_blackholed();
    }

    /// Run the simulation forward until `now() == until` or a request
    /// becomes ready for processing, dispatching responses and alarms as
    /// their times arrive. Returns the new current time.
    pub fn run_until(&self, until: Duration) -> Duration {
        let mut guard = self.shared.state.lock();
        assert_network_role(&guard, "run_until");
        while guard.clock.now() < until {
            self.run_ready_locked(&mut guard);
            if guard.has_ready_requests() {
                break;
            }
            let now = guard.clock.now();
            let mut next = guard.executor_next_wakeup;
            if let Some(at) = guard.alarms.next_fire_at() {
                next = next.min(at);
            }
            if let Some(at) = guard.responses.next_deliver_at() {
                next = next.min(at);
            }
            next = next.min(until);
            debug_assert!(next >= now, "next dispatch point is in the past");
            guard.clock.advance_to(next);
            if guard.clock.now() >= guard.executor_next_wakeup {
                // The executor's deadline arrived; let it observe the time.
                guard.waiting.executor = true;
            }
        }
        self.run_ready_locked(&mut guard);
        let now = guard.clock.now();
        tracing::debug!(now_ms = now.as_millis() as u64, "run_until complete");
        now
    }

    /// Jump virtual time straight to `to` and dispatch everything that
    /// became due, handing the executor a turn.
    ///
    /// # Panics
    ///
    /// Panics without the network role or if `to` is in the past.
    pub fn advance_time(&self, to: Duration) {
        let mut guard = self.shared.state.lock();
        assert_network_role(&guard, "advance_time");
        guard.clock.advance_to(to);
        guard.waiting.executor = true;
        self.run_ready_locked(&mut guard);
    }

    /// Dispatch every response and alarm due at the current virtual time.
    pub fn run_ready_network_operations(&self) {
        let mut guard = self.shared.state.lock();
        assert_network_role(&guard, "run_ready_network_operations");
        self.run_ready_locked(&mut guard);
    }

    /// Install the canned handshake reply fed to the connection hook's
    /// validator for `host`. Persists until replaced. Hosts without one
    /// get an empty reply.
    pub fn set_handshake_reply_for_host(&self, host: HostAndPort, reply: RemoteReply) {
        self.shared.state.lock().handshake_replies.insert(host, reply);
    }

    /// Whether scheduled work (responses or live alarms) remains queued for
    /// the network side.
    pub fn has_ready_network_operations(&self) -> bool {
        let state = self.shared.state.lock();
        !state.responses.is_empty() || state.alarms.has_live()
    }
}
