//! Error hierarchy for the coordination client, built on [`thiserror`].
//!
//! Two layers, matching how failures propagate:
//!
//! - [`ConnectError`] — connection-level failures. Handled by the lifecycle
//!   manager (logged, retried with backoff) and only surfaced to callers of
//!   `connect()` when retries are exhausted or the initial handshake fails.
//! - [`InvokeError`] — per-call failures. Surfaced as the `Err` of the
//!   specific `invoke` future; they never affect other in-flight channels.

use thiserror::Error;

/// Connection-level error: handshake or transport establishment failure.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// No transport in the preference order could be negotiated.
    #[error("connection to {endpoint} failed: {reason}")]
    HandshakeFailed {
        /// Configured endpoint URL.
        endpoint: String,
        /// Underlying failure description.
        reason: String,
    },

    /// The endpoint URL could not be parsed or rewritten for the transport.
    #[error("invalid endpoint URL {endpoint}: {reason}")]
    InvalidEndpoint {
        /// Configured endpoint URL.
        endpoint: String,
        /// Parse failure description.
        reason: String,
    },

    /// The reconnect schedule was exhausted without re-establishing the
    /// transport; the connection is now closed.
    #[error("reconnect attempts exhausted after {attempts} tries")]
    RetriesExhausted {
        /// Number of reconnect attempts made.
        attempts: u32,
    },

    /// `connect()` was called on a handle that was explicitly closed.
    #[error("connection is closed")]
    Closed,
}

/// Per-call error for a single invocation.
///
/// The first four variants are the protocol taxonomy; [`Superseded`] is the
/// outcome of the one-pending-per-channel rule: a newer call on the same
/// channel cancelled this one.
///
/// [`Superseded`]: InvokeError::Superseded
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No correlated broadcast arrived within the bound.
    #[error("no response for {method} within {timeout_ms}ms")]
    Timeout {
        /// Invoked method name.
        method: String,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The call was attempted before the connection was ready, and readiness
    /// did not arrive within the caller's wait bound.
    #[error("not connected (waited {waited_ms}ms for readiness)")]
    NotConnected {
        /// How long the caller waited for `Connected`.
        waited_ms: u64,
    },

    /// The service answered on its error channel instead of the expected
    /// result broadcast.
    #[error("server error [{code}]: {message}")]
    ServerError {
        /// Machine-readable error code from the service.
        code: String,
        /// Human-readable message from the service.
        message: String,
    },

    /// The invocation send itself failed after the connection appeared ready.
    #[error("transport send failed: {reason}")]
    TransportError {
        /// Underlying send failure description.
        reason: String,
    },

    /// A newer call on the same channel replaced this one before it resolved.
    #[error("superseded by a newer call on channel {channel}")]
    Superseded {
        /// Channel key of the superseding call.
        channel: String,
    },

    /// The response payload did not match the expected shape.
    #[error("malformed response payload for {method}: {reason}")]
    MalformedResponse {
        /// Invoked method name.
        method: String,
        /// Decode failure description.
        reason: String,
    },
}

impl InvokeError {
    /// Whether the caller may treat the outcome as inconclusive and degrade
    /// gracefully (e.g. allow form submission despite a validation timeout).
    #[must_use]
    pub fn is_inconclusive(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NotConnected { .. } | Self::Superseded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn connect_error_display() {
        let err = ConnectError::HandshakeFailed {
            endpoint: "wss://coord.example".into(),
            reason: "refused".into(),
        };
        assert!(err.to_string().contains("wss://coord.example"));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn retries_exhausted_display() {
        let err = ConnectError::RetriesExhausted { attempts: 4 };
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn invoke_timeout_is_inconclusive() {
        let err = InvokeError::Timeout {
            method: "ValidateEmail".into(),
            timeout_ms: 5000,
        };
        assert!(err.is_inconclusive());
        assert!(err.to_string().contains("ValidateEmail"));
    }

    #[test]
    fn invoke_server_error_is_conclusive() {
        let err = InvokeError::ServerError {
            code: "E1".into(),
            message: "boom".into(),
        };
        assert!(!err.is_inconclusive());
    }

    #[test]
    fn invoke_superseded_is_inconclusive() {
        let err = InvokeError::Superseded {
            channel: "email-validation".into(),
        };
        assert!(err.is_inconclusive());
    }

    #[test]
    fn errors_are_std_error() {
        let c: &dyn std::error::Error = &ConnectError::Closed;
        let i: &dyn std::error::Error = &InvokeError::TransportError {
            reason: "broken pipe".into(),
        };
        assert_matches!(c.source(), None);
        assert_matches!(i.source(), None);
    }
}
