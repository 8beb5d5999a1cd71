//! Core types for command addressing and payloads.
//!
//! This module provides the fundamental value types exchanged across the
//! network seam:
//! - [`CallbackId`]: opaque identity for submitted work
//! - [`HostAndPort`]: `host:port` target addressing
//! - [`RemoteRequest`]: an opaque command aimed at a host
//! - [`RemoteReply`]: an opaque reply, with metadata and exhaust flag

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identity the executor assigns to a command or alarm.
///
/// The simulated network uses it only for lookup and cancellation; it
/// carries no meaning beyond equality.
///
/// # Examples
///
/// ```
/// use drydock_core::CallbackId;
///
/// let a = CallbackId::new(7);
/// let b = CallbackId::new(7);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CallbackId(pub u64);

impl CallbackId {
    /// Create a new callback identity with an explicit value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cb:{}", self.0)
    }
}

/// Target address of a remote command (`host:port`).
///
/// Hosts are plain names; no resolution happens anywhere in the harness.
/// Two targets are the same simulated host iff they compare equal.
///
/// # Examples
///
/// ```
/// use drydock_core::HostAndPort;
///
/// let host = HostAndPort::parse("node1:27017").expect("parse");
/// assert_eq!(host.to_string(), "node1:27017");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAndPort {
    /// Host name. Never interpreted, only compared.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl HostAndPort {
    /// Create a new target address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse from `host:port` format.
    ///
    /// # Errors
    ///
    /// Returns an error if the port separator is missing or the port cannot
    /// be parsed.
    pub fn parse(s: &str) -> Result<Self, HostParseError> {
        let (host, port_str) = s.rsplit_once(':').ok_or(HostParseError::MissingPort)?;
        if host.is_empty() {
            return Err(HostParseError::EmptyHost);
        }
        let port: u16 = port_str.parse().map_err(|_| HostParseError::InvalidPort)?;
        Ok(Self::new(host, port))
    }
}

impl std::fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error parsing a [`HostAndPort`] from string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostParseError {
    /// The host part was empty.
    #[error("empty host name")]
    EmptyHost,
    /// The port number could not be parsed.
    #[error("invalid port number")]
    InvalidPort,
    /// No port separator (`:`) found in the input.
    #[error("missing port separator")]
    MissingPort,
}

/// A remote command submitted by the executor.
///
/// The command body is opaque to the harness; the simulated network never
/// inspects it, only hands it to the test driver for assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    /// Target host of the command.
    pub target: HostAndPort,
    /// Opaque command body.
    pub command: Value,
    /// Optional deadline, relative to submission time. When set, the
    /// operation is interrupted with a timeout error if the deadline
    /// elapses in virtual time before a response is delivered.
    pub timeout: Option<Duration>,
}

impl RemoteRequest {
    /// Create a request with no deadline.
    pub fn new(target: HostAndPort, command: Value) -> Self {
        Self {
            target,
            command,
            timeout: None,
        }
    }

    /// Attach a deadline to the request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A reply delivered for a remote command.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteReply {
    /// Opaque reply body.
    pub data: Value,
    /// Reply metadata, visible to the metadata hook.
    pub metadata: Value,
    /// For exhaust commands: `true` means more replies will follow and the
    /// operation stays open. Ignored for ordinary commands, whose first
    /// reply is always terminal.
    pub more_to_come: bool,
}

impl RemoteReply {
    /// Create a terminal reply with the given body.
    pub fn with_data(data: Value) -> Self {
        Self {
            data,
            metadata: Value::Null,
            more_to_come: false,
        }
    }

    /// Mark this reply as non-terminal (exhaust streams).
    pub fn more_to_come(mut self) -> Self {
        self.more_to_come = true;
        self
    }
}
