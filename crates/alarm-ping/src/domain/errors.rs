//! # Domain Errors
//!
//! Error types for the keep-alive subsystem. None of these is fatal: the
//! scheduling path degrades to "skip this firing" and only the ping sender's
//! lifecycle and configuration loading surface errors to callers.

use thiserror::Error;

use super::value_objects::HoldId;

/// Errors surfaced by the ping sender lifecycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeepAliveError {
    /// `start()` was called before `init()` supplied a connection.
    #[error("ping sender not initialised with a connection")]
    NotInitialized,

    /// The connection handed to `init()` has since been dropped.
    #[error("connection for ping sender is gone")]
    ConnectionGone,

    /// The connection reported an unusable client identity.
    #[error("connection reported an empty client id")]
    InvalidClientId,
}

/// Keep-alive failure reported by the connection layer.
///
/// Only ever delivered through the completion listener; this subsystem does
/// not treat it as its own failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PingError {
    /// No response to the keep-alive within the connection's own timeout.
    #[error("keep-alive timed out")]
    Timeout,

    /// Connection was lost while the keep-alive was in flight.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Listener was dropped without reporting an outcome.
    #[error("completion listener dropped without an outcome")]
    ListenerDropped,

    /// Any other connection-layer error.
    #[error("keep-alive failed: {0}")]
    Other(String),
}

/// Errors from a suspend-prevention service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuspendError {
    /// Hold id was never granted or was already released.
    #[error("unknown or already released hold {0:?}")]
    UnknownHold(HoldId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_messages() {
        assert!(KeepAliveError::NotInitialized.to_string().contains("not initialised"));
        assert!(KeepAliveError::InvalidClientId.to_string().contains("empty client id"));
    }

    #[test]
    fn test_ping_error_messages() {
        assert!(PingError::Timeout.to_string().contains("timed out"));
        assert!(PingError::ConnectionLost("reset".into())
            .to_string()
            .contains("reset"));
    }

    #[test]
    fn test_unknown_hold_error() {
        let err = SuspendError::UnknownHold(HoldId(7));
        assert!(err.to_string().contains('7'));
    }
}
