//! Transport kind vocabulary shared by settings and negotiation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A transport the client can negotiate, in degradation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Full-duplex WebSocket.
    Websocket,
    /// Long-lived HTTP stream inbound (server-sent events), POST outbound.
    Sse,
    /// Long-poll inbound, POST outbound. Last resort.
    Polling,
}

impl TransportKind {
    /// The default preference order: most capable first.
    pub const PREFERENCE_ORDER: &[Self] = &[Self::Websocket, Self::Sse, Self::Polling];
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Websocket => write!(f, "websocket"),
            Self::Sse => write!(f, "sse"),
            Self::Polling => write!(f, "polling"),
        }
    }
}
