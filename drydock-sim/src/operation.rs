//! In-flight network operations and their lifecycle.
//!
//! Every command submitted through the facade becomes a [`NetworkOperation`]
//! in an append-only arena. Operations are never erased, so an
//! [`OperationId`] handed to the driver stays valid for the life of the
//! simulation.
//!
//! An operation moves through four logical states:
//!
//! - *unscheduled*: submitted, not yet observed by the driver
//! - *processing*: observed (or blackholed), no terminal response queued
//! - *scheduled*: a terminal response is queued but not yet delivered
//! - *finished*: the terminal response has been delivered

use std::time::Duration;

use drydock_core::{CallbackId, CommandStatus, RemoteRequest};

/// Stable handle to an operation in the arena.
///
/// Indices are never reused; the operation behind an id lives until the
/// simulation is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(pub(crate) usize);

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op:{}", self.0)
    }
}

/// Continuation stored on an operation.
///
/// Ordinary commands are invoked at most once (guarded by the finished
/// flag); exhaust commands are invoked once per reply.
pub(crate) type ReplyFn = Box<dyn FnMut(CommandStatus) + Send>;

/// One submitted remote command.
pub(crate) struct NetworkOperation {
    callback_id: CallbackId,
    request: RemoteRequest,
    request_date: Duration,
    on_reply: Option<ReplyFn>,
    exhaust: bool,

    is_processing: bool,
    is_blackholed: bool,
    is_scheduled: bool,
    is_finished: bool,
}

impl NetworkOperation {
    pub(crate) fn new(
        callback_id: CallbackId,
        request: RemoteRequest,
        request_date: Duration,
        on_reply: ReplyFn,
        exhaust: bool,
    ) -> Self {
        Self {
            callback_id,
            request,
            request_date,
            on_reply: Some(on_reply),
            exhaust,
            is_processing: false,
            is_blackholed: false,
            is_scheduled: false,
            is_finished: false,
        }
    }

    pub(crate) fn callback_id(&self) -> CallbackId {
        self.callback_id
    }

    pub(crate) fn request(&self) -> &RemoteRequest {
        &self.request
    }

    pub(crate) fn request_date(&self) -> Duration {
        self.request_date
    }

    pub(crate) fn is_exhaust(&self) -> bool {
        self.exhaust
    }

    /// True while the driver can still observe this operation via
    /// `next_ready_request`: not yet processed, cancelled, or timed out.
    pub(crate) fn has_ready_request(&self) -> bool {
        !self.is_processing && !self.is_finished
    }

    pub(crate) fn is_blackholed(&self) -> bool {
        self.is_blackholed
    }

    pub(crate) fn is_scheduled(&self) -> bool {
        self.is_scheduled
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.is_finished
    }

    /// The driver has taken ownership, like a remote node picking the
    /// command off the wire.
    pub(crate) fn mark_processing(&mut self) {
        self.is_processing = true;
    }

    /// The driver has declined to ever respond. Only shutdown finalizes a
    /// blackholed operation.
    pub(crate) fn mark_blackholed(&mut self) {
        self.is_processing = true;
        self.is_blackholed = true;
    }

    /// A terminal response has been queued.
    pub(crate) fn mark_scheduled(&mut self) {
        self.is_scheduled = true;
    }

    /// The terminal response has been delivered.
    pub(crate) fn mark_finished(&mut self) {
        self.is_finished = true;
    }

    /// Take the continuation for invocation with the core mutex released.
    /// Restore it afterwards via [`NetworkOperation::restore_reply_fn`] if
    /// the delivered reply was non-terminal.
    pub(crate) fn take_reply_fn(&mut self) -> Option<ReplyFn> {
        self.on_reply.take()
    }

    pub(crate) fn restore_reply_fn(&mut self, on_reply: ReplyFn) {
        self.on_reply = Some(on_reply);
    }

    /// Human-readable lifecycle state, for diagnostics.
    pub(crate) fn state_name(&self) -> &'static str {
        if self.is_finished {
            "finished"
        } else if self.is_blackholed {
            "blackholed"
        } else if self.is_scheduled {
            "scheduled"
        } else if self.is_processing {
            "processing"
        } else {
            "unscheduled"
        }
    }
}

impl std::fmt::Debug for NetworkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkOperation")
            .field("callback_id", &self.callback_id)
            .field("target", &self.request.target)
            .field("request_date", &self.request_date)
            .field("exhaust", &self.exhaust)
            .field("state", &self.state_name())
            .finish()
    }
}
