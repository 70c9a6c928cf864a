//! Transport abstraction and negotiation.
//!
//! The coordination service is reachable over three transports, tried in
//! preference order at connect time: WebSocket (full duplex), SSE (long-lived
//! HTTP stream inbound, POST outbound), and long polling. Once negotiated the
//! transport is opaque to the correlator; all three carry the same JSON text
//! frames.

pub(crate) mod polling;
pub(crate) mod sse;
pub(crate) mod websocket;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Duration;
use tracing::{debug, warn};

use beacon_core::errors::ConnectError;
use beacon_core::transport::TransportKind;
use beacon_settings::ConnectionSettings;

/// A transport-level failure after the connection was established.
#[derive(Debug, Error)]
#[error("{kind} transport: {reason}")]
pub(crate) struct TransportFailure {
    /// Which transport failed.
    pub kind: TransportKind,
    /// Failure description.
    pub reason: String,
}

/// One negotiated, bidirectional text-frame transport.
#[async_trait]
pub(crate) trait Transport: Send + std::fmt::Debug {
    /// Send one outbound frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportFailure>;

    /// Receive the next inbound frame. `None` means the peer closed cleanly.
    async fn recv(&mut self) -> Option<Result<String, TransportFailure>>;

    /// Tear the transport down. Best effort.
    async fn close(&mut self);

    /// Which transport this is.
    fn kind(&self) -> TransportKind;
}

/// Negotiate a transport per the configured preference order.
///
/// Each candidate gets `handshake_timeout_ms` to establish; the first success
/// wins. All candidates failing is a [`ConnectError::HandshakeFailed`].
pub(crate) async fn negotiate(
    settings: &ConnectionSettings,
) -> Result<Box<dyn Transport>, ConnectError> {
    let handshake = Duration::from_millis(settings.handshake_timeout_ms);
    let mut last_reason = String::from("no transports configured");

    for &kind in &settings.transport_order {
        debug!(%kind, endpoint = %settings.endpoint_url, "negotiating transport");
        let attempt = tokio::time::timeout(handshake, connect_one(kind, &settings.endpoint_url));
        match attempt.await {
            Ok(Ok(transport)) => {
                debug!(%kind, "transport negotiated");
                return Ok(transport);
            }
            Ok(Err(err)) => {
                warn!(%kind, error = %err, "transport candidate failed");
                last_reason = err.to_string();
            }
            Err(_) => {
                warn!(%kind, timeout_ms = settings.handshake_timeout_ms, "transport handshake timed out");
                last_reason = format!("{kind} handshake timed out");
            }
        }
    }

    Err(ConnectError::HandshakeFailed {
        endpoint: settings.endpoint_url.clone(),
        reason: last_reason,
    })
}

async fn connect_one(
    kind: TransportKind,
    endpoint: &str,
) -> Result<Box<dyn Transport>, ConnectError> {
    match kind {
        TransportKind::Websocket => {
            let t = websocket::WebSocketTransport::connect(endpoint).await?;
            Ok(Box::new(t))
        }
        TransportKind::Sse => {
            let t = sse::SseTransport::connect(endpoint).await?;
            Ok(Box::new(t))
        }
        TransportKind::Polling => {
            let t = polling::PollingTransport::connect(endpoint).await?;
            Ok(Box::new(t))
        }
    }
}

/// Join a path segment onto the configured endpoint URL.
pub(crate) fn endpoint_join(endpoint: &str, segment: &str) -> String {
    format!("{}/{segment}", endpoint.trim_end_matches('/'))
}
