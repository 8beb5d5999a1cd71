use thiserror::Error;

use crate::types::RemoteReply;

/// Errors surfaced through response continuations and facade return values.
///
/// Contract violations by the test author (driver calls off the network
/// role, responses scheduled in the past or for a blackholed operation) are
/// not represented here: those are panics, because they indicate incorrect
/// test code rather than a condition the executor should handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The interface has been shut down; no further work is accepted.
    #[error("network interface shutdown in progress")]
    ShutdownInProgress,

    /// The operation or alarm was terminated by cancellation or shutdown.
    #[error("callback canceled")]
    CallbackCanceled,

    /// The operation's deadline elapsed in virtual time before a response
    /// was delivered.
    #[error("operation exceeded time limit")]
    NetworkTimeout,

    /// A connection hook rejected the host during the handshake.
    #[error("host validation failed: {0}")]
    HostValidationFailed(String),

    /// The simulated remote end reported a failure.
    #[error("remote error: {0}")]
    Remote(String),
}

/// Outcome delivered to a command's response continuation.
pub type CommandStatus = Result<RemoteReply, NetworkError>;

/// Outcome delivered to an alarm action.
pub type AlarmStatus = Result<(), NetworkError>;
