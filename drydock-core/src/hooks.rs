//! Injection points consumed by the simulated network.
//!
//! Hooks are installed once at setup and read without locking thereafter.

use serde_json::Value;

use crate::error::NetworkError;
use crate::types::{HostAndPort, RemoteReply, RemoteRequest};

/// First-contact hook, invoked once per previously-unseen host.
///
/// When installed, every command aimed at an unknown host triggers a
/// handshake: the host's canned handshake reply is validated, and an
/// optional post-connection command is issued and must succeed before the
/// user's command is enqueued. See the simulation crate for the pipeline.
pub trait ConnectionHook: Send + Sync {
    /// Validate a host given the canned handshake reply configured for it.
    ///
    /// # Errors
    ///
    /// A returned error fails the triggering command verbatim, and the host
    /// is not marked as known.
    fn validate_host(
        &self,
        host: &HostAndPort,
        handshake_reply: &RemoteReply,
    ) -> Result<(), NetworkError>;

    /// Produce an optional post-connection command for a validated host.
    ///
    /// Returning `Ok(None)` completes the handshake immediately.
    ///
    /// # Errors
    ///
    /// A returned error fails the triggering command verbatim.
    fn generate_request(&self, host: &HostAndPort) -> Result<Option<RemoteRequest>, NetworkError>;
}

/// Egress metadata hook, invoked when the driver enqueues a reply.
///
/// Lets a test observe or adjust reply metadata. Not on the coordination
/// hot path.
pub trait MetadataHook: Send + Sync {
    /// Observe or modify the metadata of a reply about to be enqueued for
    /// `host`.
    ///
    /// # Errors
    ///
    /// Errors are surfaced as panics by the driver, since a failing
    /// metadata hook indicates a broken test fixture.
    fn write_metadata(&self, host: &HostAndPort, metadata: &mut Value) -> Result<(), NetworkError>;
}
