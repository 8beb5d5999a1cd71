//! First-contact handshake pipeline.
//!
//! A command aimed at a host the simulation has not seen before goes
//! through the connection hook, when one is installed: the host's canned
//! handshake reply is validated, and any post-connection command the hook
//! produces becomes a *companion operation* inserted ahead of the user's.
//! The companion is observable by the driver like any other request, so
//! tests can assert on it; the executor only ever sees the user
//! operation's terminal response.

use drydock_core::CommandStatus;

use crate::net::SimNetwork;
use crate::operation::{NetworkOperation, ReplyFn};
use crate::state::SimState;

impl SimNetwork {
    /// "Connect" to the operation's target, then enqueue it.
    ///
    /// Only called for hosts outside the known set. With no hook
    /// installed, first contact is trivially successful.
    pub(crate) fn connect_then_enqueue_locked(&self, state: &mut SimState, op: NetworkOperation) {
        let target = op.request().target.clone();
        let Some(hook) = self.connection_hook() else {
            state.known_hosts.insert(target);
            self.enqueue_locked(state, op);
            return;
        };

        tracing::debug!(host = %target, "first contact, running handshake");
        let handshake_reply = state
            .handshake_replies
            .get(&target)
            .cloned()
            .unwrap_or_default();
        if let Err(error) = hook.validate_host(&target, &handshake_reply) {
            tracing::debug!(host = %target, %error, "host validation failed");
            let now = state.clock.now();
            let id = state.push_operation(op);
            state.queue_response(id, now, Err(error));
            return;
        }

        let post_connect = match hook.generate_request(&target) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(host = %target, %error, "hook failed to produce a request");
                let now = state.clock.now();
                let id = state.push_operation(op);
                state.queue_response(id, now, Err(error));
                return;
            }
        };
        let Some(post_connect) = post_connect else {
            state.known_hosts.insert(target);
            self.enqueue_locked(state, op);
            return;
        };

        // The companion's completion gates the user's operation: success
        // marks the host known and enqueues it; failure fails it with the
        // companion's status.
        let handle = op.callback_id();
        let net = self.downgrade();
        let mut pending = Some(op);
        let on_companion_reply: ReplyFn = Box::new(move |status: CommandStatus| {
            let Some(op) = pending.take() else {
                return;
            };
            let Some(net) = net.upgrade() else {
                return;
            };
            let mut state = net.shared.state.lock();
            match status {
                Ok(_) => {
                    let target = op.request().target.clone();
                    tracing::debug!(host = %target, "handshake complete, host known");
                    state.known_hosts.insert(target);
                    net.enqueue_locked(&mut state, op);
                }
                Err(error) => {
                    tracing::debug!(%error, "post-connection command failed");
                    let now = state.clock.now();
                    let id = state.push_operation(op);
                    state.queue_response(id, now, Err(error));
                }
            }
        });
        let request_date = state.clock.now();
        let companion =
            NetworkOperation::new(handle, post_connect, request_date, on_companion_reply, false);
        self.enqueue_locked(state, companion);
    }
}
