//! The simulated network interface and its coordination core.
//!
//! [`SimNetwork`] plays both parts of the harness: it is the
//! [`NetworkInterface`] handed to the executor under test, and it carries
//! the driver API (see the driver module) used by the test body acting as
//! the network.
//!
//! ## The two-thread dance
//!
//! One mutex guards all state; two condition variables (`wake_network`,
//! `wake_executor`) are the release tokens. A role tag says who is
//! logically running; a waiting set says who wants to. At most one
//! participant runs at any instant:
//!
//! - The executor parks inside `wait_for_work[_until]`, granting the
//!   network the next turn.
//! - The network parks inside `enter_network`, inside
//!   `next_ready_request`, and at the end of each dispatch pass once the
//!   executor has been signalled.
//!
//! Continuations always run with the mutex released, on the thread that
//! drives the dispatch (the network side) or, for shutdown, on the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use drydock_core::{
    AlarmAction, CallbackId, ConnectionHook, ExhaustCallback, MetadataHook, NetworkError,
    NetworkInterface, RemoteRequest, ResponseCallback,
};

use crate::config::SimConfig;
use crate::operation::{NetworkOperation, OperationId, ReplyFn};
use crate::response::ScheduledResponse;
use crate::state::{SimState, ThreadRole};

pub(crate) struct Shared {
    pub(crate) state: Mutex<SimState>,
    pub(crate) wake_network: Condvar,
    pub(crate) wake_executor: Condvar,
    pub(crate) in_shutdown: AtomicBool,
    pub(crate) connection_hook: OnceLock<Box<dyn ConnectionHook>>,
    pub(crate) metadata_hook: OnceLock<Box<dyn MetadataHook>>,
    pub(crate) config: SimConfig,
}

/// Deterministic mock network interface.
///
/// Construct one per executor under test, hand a clone to the executor as
/// its [`NetworkInterface`], and drive the simulation from the test body
/// through the driver API.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// # use drydock_core::NetworkInterface;
/// use drydock_sim::SimNetwork;
///
/// let net = SimNetwork::new();
/// let guard = net.enter();
/// guard.run_until(Duration::from_millis(10));
/// assert_eq!(net.now(), Duration::from_millis(10));
/// ```
#[derive(Clone)]
pub struct SimNetwork {
    pub(crate) shared: Arc<Shared>,
}

/// Weak handle to a [`SimNetwork`].
///
/// Internally-synthesized continuations (timeout alarms, handshake
/// completions) hold one of these so they can re-enter the simulation
/// without keeping it alive.
#[derive(Clone)]
pub struct WeakSimNetwork {
    shared: Weak<Shared>,
}

impl WeakSimNetwork {
    /// Attempt to get back a strong handle.
    pub fn upgrade(&self) -> Option<SimNetwork> {
        self.shared.upgrade().map(|shared| SimNetwork { shared })
    }
}

impl SimNetwork {
    /// Create a simulation with default configuration.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a simulation with the given configuration.
    pub fn with_config(config: SimConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SimState::new(config.epoch)),
                wake_network: Condvar::new(),
                wake_executor: Condvar::new(),
                in_shutdown: AtomicBool::new(false),
                connection_hook: OnceLock::new(),
                metadata_hook: OnceLock::new(),
                config,
            }),
        }
    }

    /// Create a weak handle to this simulation.
    pub fn downgrade(&self) -> WeakSimNetwork {
        WeakSimNetwork {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Install the connection hook. Must happen before `startup()`.
    ///
    /// # Panics
    ///
    /// Panics if a hook is already installed or the interface has started.
    pub fn set_connection_hook(&self, hook: Box<dyn ConnectionHook>) {
        assert!(
            !self.shared.state.lock().has_started,
            "hooks must be installed before startup()"
        );
        if self.shared.connection_hook.set(hook).is_err() {
            panic!("connection hook already installed");
        }
    }

    /// Install the egress metadata hook. Must happen before `startup()`.
    ///
    /// # Panics
    ///
    /// Panics if a hook is already installed or the interface has started.
    pub fn set_metadata_hook(&self, hook: Box<dyn MetadataHook>) {
        assert!(
            !self.shared.state.lock().has_started,
            "hooks must be installed before startup()"
        );
        if self.shared.metadata_hook.set(hook).is_err() {
            panic!("metadata hook already installed");
        }
    }

    pub(crate) fn connection_hook(&self) -> Option<&dyn ConnectionHook> {
        self.shared.connection_hook.get().map(Box::as_ref)
    }

    pub(crate) fn metadata_hook(&self) -> Option<&dyn MetadataHook> {
        self.shared.metadata_hook.get().map(Box::as_ref)
    }

    // ------------------------------------------------------------------
    // Coordination core
    // ------------------------------------------------------------------

    /// Implementation of `wait_for_work*`: consume a pending work token or
    /// park until the executor is runnable again, granting the network the
    /// turn on every iteration.
    pub(crate) fn wait_for_work_locked(&self, guard: &mut MutexGuard<'_, SimState>) {
        if guard.waiting.executor {
            guard.waiting.executor = false;
            return;
        }
        guard.currently_running = ThreadRole::None;
        while !guard.is_executor_runnable() {
            guard.waiting.network = true;
            self.shared.wake_network.notify_one();
            self.shared.wake_executor.wait(guard);
        }
        guard.currently_running = ThreadRole::Executor;
        guard.waiting.executor = false;
    }

    /// Dispatch every response and alarm due at or before the current
    /// virtual time, then hand the turn to the executor if it has been
    /// signalled, parking until the network is runnable again.
    ///
    /// Continuations run with the mutex released; work they enqueue for the
    /// current time (a timeout alarm interrupting its operation, say) is
    /// dispatched in this same pass.
    pub(crate) fn run_ready_locked(&self, guard: &mut MutexGuard<'_, SimState>) {
        debug_assert_eq!(guard.currently_running, ThreadRole::Network);
        loop {
            let now = guard.clock.now();
            if let Some(response) = guard.responses.pop_due(now) {
                let ScheduledResponse {
                    operation: id,
                    status,
                    ..
                } = response;
                let taken = {
                    let op = &mut guard.operations[id.0];
                    if op.is_finished() {
                        // A late duplicate for an already-finished
                        // operation is dropped.
                        continue;
                    }
                    let terminal = match &status {
                        Err(_) => true,
                        Ok(reply) => !(op.is_exhaust() && reply.more_to_come),
                    };
                    if terminal {
                        op.mark_finished();
                    }
                    op.take_reply_fn().map(|f| (f, terminal))
                };
                let Some((mut reply_fn, terminal)) = taken else {
                    continue;
                };
                tracing::debug!(operation = %id, terminal, "delivering response");
                MutexGuard::unlocked(guard, || reply_fn(status));
                if !terminal {
                    guard.operations[id.0].restore_reply_fn(reply_fn);
                }
                continue;
            }
            if let Some(alarm) = guard.alarms.pop_due(now) {
                tracing::debug!(handle = %alarm.handle, "firing alarm");
                let action = alarm.action;
                MutexGuard::unlocked(guard, || action(Ok(())));
                continue;
            }
            break;
        }

        if !guard.waiting.executor {
            return;
        }
        tracing::trace!("yielding to executor");
        self.shared.wake_executor.notify_one();
        guard.currently_running = ThreadRole::None;
        while !guard.is_network_runnable() {
            self.shared.wake_network.wait(guard);
        }
        guard.currently_running = ThreadRole::Network;
        guard.waiting.network = false;
        tracing::trace!("network resumed");
    }

    // ------------------------------------------------------------------
    // Submission path
    // ------------------------------------------------------------------

    pub(crate) fn submit(
        &self,
        id: CallbackId,
        request: RemoteRequest,
        on_reply: ReplyFn,
        exhaust: bool,
    ) -> Result<(), NetworkError> {
        if self.in_shutdown() {
            return Err(NetworkError::ShutdownInProgress);
        }
        let mut state = self.shared.state.lock();
        let now = state.clock.now();
        tracing::debug!(callback = %id, target = %request.target, exhaust, "submitting command");
        let op = NetworkOperation::new(id, request, now, on_reply, exhaust);
        if state.known_hosts.contains(&op.request().target) {
            self.enqueue_locked(&mut state, op);
        } else {
            self.connect_then_enqueue_locked(&mut state, op);
        }
        // Wake the network side if it is parked waiting for submissions.
        self.shared.wake_network.notify_one();
        Ok(())
    }

    /// Append an operation to the arena and register its timeout alarm, if
    /// the request carries a deadline.
    pub(crate) fn enqueue_locked(&self, state: &mut SimState, op: NetworkOperation) {
        let timeout = op.request().timeout;
        let handle = op.callback_id();
        let id = state.push_operation(op);
        tracing::debug!(operation = %id, "operation ready for the network");
        if let Some(timeout) = timeout {
            let deadline = state.clock.now() + timeout;
            let net = self.downgrade();
            state.alarms.schedule(
                handle,
                deadline,
                Box::new(move |status| {
                    if status.is_err() {
                        return;
                    }
                    let Some(net) = net.upgrade() else {
                        return;
                    };
                    let mut state = net.shared.state.lock();
                    state.interrupt_with_response(handle, Err(NetworkError::NetworkTimeout));
                }),
            );
        }
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkInterface for SimNetwork {
    fn startup(&self) {
        let mut state = self.shared.state.lock();
        assert!(!state.has_started, "startup() may only be called once");
        assert_eq!(
            state.currently_running,
            ThreadRole::None,
            "startup() must precede any role acquisition"
        );
        tracing::debug!("starting simulated network");
        state.has_started = true;
        state.currently_running = ThreadRole::Executor;
    }

    fn shutdown(&self) {
        if self.shared.in_shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut guard = self.shared.state.lock();
        tracing::debug!("shutting down simulated network");
        let now = guard.clock.now();

        // Undelivered replies are superseded by synthetic cancellations:
        // every unfinished operation, blackholed ones included, gets
        // exactly one CallbackCanceled.
        guard.responses.clear();
        for idx in 0..guard.operations.len() {
            if !guard.operations[idx].is_finished() {
                guard.queue_response(OperationId(idx), now, Err(NetworkError::CallbackCanceled));
            }
        }

        // Deliver inline; the driver may never take another turn.
        while let Some(response) = guard.responses.pop_due(now) {
            let ScheduledResponse {
                operation: id,
                status,
                ..
            } = response;
            let taken = {
                let op = &mut guard.operations[id.0];
                if op.is_finished() {
                    continue;
                }
                op.mark_finished();
                op.take_reply_fn()
            };
            let Some(mut reply_fn) = taken else {
                continue;
            };
            MutexGuard::unlocked(&mut guard, || reply_fn(status));
        }

        let live_alarms = guard.alarms.drain_live();
        guard.waiting.executor = true;
        MutexGuard::unlocked(&mut guard, || {
            for alarm in live_alarms {
                (alarm.action)(Err(NetworkError::CallbackCanceled));
            }
        });

        self.shared.wake_network.notify_all();
        self.shared.wake_executor.notify_all();
    }

    fn in_shutdown(&self) -> bool {
        self.shared.in_shutdown.load(Ordering::SeqCst)
    }

    fn wait_for_work(&self) {
        self.wait_for_work_until(Duration::MAX);
    }

    fn wait_for_work_until(&self, when: Duration) {
        if self.in_shutdown() {
            return;
        }
        let mut guard = self.shared.state.lock();
        guard.executor_next_wakeup = when;
        if when <= guard.clock.now() {
            guard.executor_next_wakeup = Duration::MAX;
            return;
        }
        self.wait_for_work_locked(&mut guard);
        // The published wake time only means something while parked.
        guard.executor_next_wakeup = Duration::MAX;
    }

    fn signal_work_available(&self) {
        let mut state = self.shared.state.lock();
        state.waiting.executor = true;
        if state.currently_running == ThreadRole::None {
            self.shared.wake_executor.notify_one();
        }
    }

    fn now(&self) -> Duration {
        self.shared.state.lock().clock.now()
    }

    fn host_name(&self) -> String {
        self.shared.config.host_name.clone()
    }

    fn start_command(
        &self,
        id: CallbackId,
        request: RemoteRequest,
        on_finish: ResponseCallback,
    ) -> Result<(), NetworkError> {
        let mut once = Some(on_finish);
        let on_reply: ReplyFn = Box::new(move |status| {
            if let Some(f) = once.take() {
                f(status);
            }
        });
        self.submit(id, request, on_reply, false)
    }

    fn start_exhaust_command(
        &self,
        id: CallbackId,
        request: RemoteRequest,
        on_reply: ExhaustCallback,
    ) -> Result<(), NetworkError> {
        self.submit(id, request, on_reply, true)
    }

    fn cancel_command(&self, id: CallbackId) {
        if self.in_shutdown() {
            return;
        }
        let mut state = self.shared.state.lock();
        tracing::debug!(callback = %id, "cancelling command");
        state.interrupt_with_response(id, Err(NetworkError::CallbackCanceled));
    }

    fn set_alarm(
        &self,
        id: CallbackId,
        when: Duration,
        action: AlarmAction,
    ) -> Result<(), NetworkError> {
        if self.in_shutdown() {
            action(Err(NetworkError::ShutdownInProgress));
            return Err(NetworkError::ShutdownInProgress);
        }
        let mut state = self.shared.state.lock();
        // An alarm in the past runs at the next dispatch.
        let fire_at = when.max(state.clock.now());
        state.alarms.schedule(id, fire_at, action);
        Ok(())
    }

    fn cancel_alarm(&self, id: CallbackId) {
        self.shared.state.lock().alarms.cancel(id);
    }

    fn schedule(&self, action: AlarmAction) -> Result<(), NetworkError> {
        self.set_alarm(CallbackId::default(), Duration::ZERO, action)
    }

    fn on_network_thread(&self) -> bool {
        self.shared.state.lock().currently_running == ThreadRole::Network
    }
}

impl std::fmt::Display for SimNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        let ready = state
            .operations
            .iter()
            .filter(|op| op.has_ready_request())
            .count();
        write!(
            f,
            "SimNetwork -- running: {:?}, now: {:?}, started: {}, shutdown: {}, \
             operations: {} (ready: {}), responses: {}, alarms: {}",
            state.currently_running,
            state.clock.now(),
            state.has_started,
            self.in_shutdown(),
            state.operations.len(),
            ready,
            state.responses.len(),
            state.alarms.len(),
        )
    }
}
