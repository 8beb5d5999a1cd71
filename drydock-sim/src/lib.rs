//! # drydock-sim
//!
//! Deterministic simulated network for driving unit tests of asynchronous
//! task executors.
//!
//! The simulation fully virtualizes the network and the clock. When the
//! executor under test submits a remote command, it lands in an unscheduled
//! queue for the test driver to examine. The driver may schedule a reply or
//! an error at any virtual time, swallow the request forever, or run the
//! simulation forward until something becomes ready, via `run_until`.
//!
//! The thread acting as the network and the executor's thread are tightly
//! synchronized: a single mutex, two condition variables, and a role tag
//! guarantee that at most one of them is logically running at any instant,
//! which is what makes tests deterministic.
//!
//! ## Getting started
//!
//! ```
//! use std::time::Duration;
//! use drydock_core::{CallbackId, HostAndPort, NetworkInterface, RemoteReply, RemoteRequest};
//! use drydock_sim::SimNetwork;
//! use serde_json::json;
//!
//! let net = SimNetwork::new();
//!
//! // The executor side submits a command.
//! net.start_command(
//!     CallbackId::new(1),
//!     RemoteRequest::new(HostAndPort::new("node1", 27017), json!({"ping": 1})),
//!     Box::new(|status| assert!(status.is_ok())),
//! )
//! .expect("submit");
//!
//! // The test body takes the network role and services it.
//! let guard = net.enter();
//! let op = guard.next_ready_request();
//! guard.schedule_successful_response_at(op, net.now(), RemoteReply::with_data(json!({"ok": 1})));
//! guard.run_ready_network_operations();
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Core Modules
// =============================================================================

mod alarm;
mod clock;
mod config;
mod driver;
mod guard;
mod handshake;
mod net;
mod operation;
mod response;
mod state;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use clock::VirtualClock;
pub use config::SimConfig;
pub use guard::InNetworkGuard;
pub use net::{SimNetwork, WeakSimNetwork};
pub use operation::OperationId;

// Re-exported core abstractions, so tests can depend on one crate.
pub use drydock_core::{
    AlarmAction, AlarmStatus, CallbackId, CommandStatus, ConnectionHook, ExhaustCallback,
    HostAndPort, MetadataHook, NetworkError, NetworkInterface, RemoteReply, RemoteRequest,
    ResponseCallback,
};
