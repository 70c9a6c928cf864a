//! Connection state machine.
//!
//! The connection's lifecycle is an explicit enumerated state published
//! through a `tokio::sync::watch` channel. The connection actor is the single
//! writer; everything else observes.

use std::fmt;

/// State of the one transport instance to the coordination service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; the initial handshake has not succeeded.
    Disconnected,
    /// First handshake in flight.
    Connecting,
    /// Transport established and usable.
    Connected,
    /// Transport dropped unexpectedly; retrying per the reconnect schedule.
    Reconnecting,
    /// Torn down explicitly or reconnect schedule exhausted.
    Closed,
}

impl ConnectionState {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Illegal transitions indicate a bug in the actor, not a runtime
    /// condition; the actor debug-asserts on them.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected | Self::Closed)
                | (Self::Connected, Self::Reconnecting | Self::Closed)
                | (Self::Reconnecting, Self::Connected | Self::Closed)
        )
    }

    /// Whether the actor behind this state is still running.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
