//! # drydock-core
//!
//! Core abstractions for the drydock deterministic network test harness.
//!
//! This crate provides the traits and value types shared between an
//! asynchronous task executor under test and the simulated network that
//! drives it. The executor depends only on these abstractions; the
//! `drydock-sim` crate supplies the deterministic implementation.
//!
//! ## The seam
//!
//! A task executor interacts with the outside world through a narrow
//! surface: submit a remote command, wait for work, set an alarm, read the
//! clock. By putting that surface behind [`NetworkInterface`], a test can
//! substitute a fully virtualized network and clock and drive the executor
//! through any interleaving it wants to examine, reproducibly.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               Executor under test                     │
//! │        Uses: NetworkInterface, CallbackId, ...        │
//! └───────────────────────┬──────────────────────────────┘
//!                         │ depends on traits
//!                         ▼
//!               ┌──────────────────┐
//!               │   drydock-sim    │
//!               │   SimNetwork     │
//!               │ (deterministic)  │
//!               └──────────────────┘
//! ```
//!
//! ## Core Types
//!
//! - [`CallbackId`]: opaque identity the executor attaches to submitted work
//! - [`HostAndPort`]: `host:port` addressing for command targets
//! - [`RemoteRequest`] / [`RemoteReply`]: opaque command payloads
//! - [`NetworkError`]: the status vocabulary delivered to continuations

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod error;
mod hooks;
mod interface;
mod types;

// Error exports
pub use error::{AlarmStatus, CommandStatus, NetworkError};

// Hook exports
pub use hooks::{ConnectionHook, MetadataHook};

// Interface exports
pub use interface::{AlarmAction, ExhaustCallback, NetworkInterface, ResponseCallback};

// Core type exports
pub use types::{CallbackId, HostAndPort, HostParseError, RemoteReply, RemoteRequest};
