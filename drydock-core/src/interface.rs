//! The executor-facing network facade.
//!
//! [`NetworkInterface`] is the seam between a task executor and whatever
//! carries its remote commands. Production code would implement it over a
//! real transport; `drydock-sim` implements it over a virtual clock and a
//! test-driven simulation.
//!
//! The surface is deliberately blocking: `wait_for_work` parks the calling
//! OS thread until the network side has produced something to observe. That
//! is what lets a test serialize the executor and the simulated network into
//! one deterministic interleaving.

use std::time::Duration;

use crate::error::{AlarmStatus, CommandStatus, NetworkError};
use crate::types::{CallbackId, RemoteRequest};

/// Continuation invoked exactly once with a command's terminal outcome.
pub type ResponseCallback = Box<dyn FnOnce(CommandStatus) + Send>;

/// Continuation invoked once per reply of an exhaust command; the terminal
/// reply is the last invocation.
pub type ExhaustCallback = Box<dyn FnMut(CommandStatus) + Send>;

/// Action invoked when an alarm fires (or is cancelled).
pub type AlarmAction = Box<dyn FnOnce(AlarmStatus) + Send>;

/// Interface used by a task executor to issue remote commands and wait for
/// their outcomes.
///
/// One executor thread at a time may use the blocking operations
/// (`wait_for_work`, `wait_for_work_until`); the remaining operations are
/// brief and merely take the interface's internal lock.
pub trait NetworkInterface: Send + Sync {
    /// Start up the interface. Must be called at most once, before any
    /// blocking operation.
    fn startup(&self);

    /// Shut down the interface. All unfinished operations and pending
    /// alarms are terminated with [`NetworkError::CallbackCanceled`];
    /// subsequent submissions fail with
    /// [`NetworkError::ShutdownInProgress`].
    fn shutdown(&self);

    /// Whether [`NetworkInterface::shutdown`] has been called.
    fn in_shutdown(&self) -> bool;

    /// Park the calling (executor) thread until the network side has
    /// produced work for it to observe.
    fn wait_for_work(&self);

    /// Like [`NetworkInterface::wait_for_work`], but also returns once the
    /// clock reaches `when`. Returns immediately if `when` is already in
    /// the past.
    fn wait_for_work_until(&self, when: Duration);

    /// Post a work-available token: the next (or current) `wait_for_work`
    /// call consumes it and returns without blocking.
    fn signal_work_available(&self);

    /// Current time. Under the simulation this is virtual time since the
    /// epoch; it never advances except at the network side's request.
    fn now(&self) -> Duration;

    /// Name this interface reports for itself.
    fn host_name(&self) -> String;

    /// Submit a remote command. `on_finish` is invoked exactly once with
    /// the terminal outcome.
    ///
    /// # Errors
    ///
    /// Fails with [`NetworkError::ShutdownInProgress`] after shutdown.
    fn start_command(
        &self,
        id: CallbackId,
        request: RemoteRequest,
        on_finish: ResponseCallback,
    ) -> Result<(), NetworkError>;

    /// Submit an exhaust command: `on_reply` may be invoked multiple times,
    /// once per reply; the operation finishes on the first terminal reply
    /// (an error, or a reply without `more_to_come`).
    ///
    /// # Errors
    ///
    /// Fails with [`NetworkError::ShutdownInProgress`] after shutdown.
    fn start_exhaust_command(
        &self,
        id: CallbackId,
        request: RemoteRequest,
        on_reply: ExhaustCallback,
    ) -> Result<(), NetworkError>;

    /// Cancel a submitted command. If the operation already has a terminal
    /// response queued (or delivered), the cancellation loses the race and
    /// does nothing; otherwise the continuation receives
    /// [`NetworkError::CallbackCanceled`].
    fn cancel_command(&self, id: CallbackId);

    /// Schedule `action` to run with success status when virtual time
    /// reaches `when`. A `when` at or before the current time runs at the
    /// network side's next dispatch.
    ///
    /// # Errors
    ///
    /// After shutdown, `action` is invoked inline with
    /// [`NetworkError::ShutdownInProgress`] and the call returns the same
    /// error.
    fn set_alarm(
        &self,
        id: CallbackId,
        when: Duration,
        action: AlarmAction,
    ) -> Result<(), NetworkError>;

    /// Cancel a pending alarm. The action is dropped at dispatch time and
    /// never invoked with success status.
    fn cancel_alarm(&self, id: CallbackId);

    /// Run `action` as soon as possible, with success status.
    ///
    /// # Errors
    ///
    /// Same shutdown behavior as [`NetworkInterface::set_alarm`].
    fn schedule(&self, action: AlarmAction) -> Result<(), NetworkError>;

    /// Whether the network role is currently held.
    fn on_network_thread(&self) -> bool;
}
