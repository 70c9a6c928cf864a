//! WebSocket transport — thin client over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use beacon_core::errors::ConnectError;
use beacon_core::transport::TransportKind;

use super::{Transport, TransportFailure};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Full-duplex WebSocket transport.
#[derive(Debug)]
pub(crate) struct WebSocketTransport {
    ws: WsStream,
}

impl WebSocketTransport {
    /// Connect to the endpoint, rewriting the URL scheme to ws/wss.
    pub(crate) async fn connect(endpoint: &str) -> Result<Self, ConnectError> {
        let url = ws_url(endpoint)?;
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectError::HandshakeFailed {
                endpoint: endpoint.to_owned(),
                reason: format!("WebSocket connect: {e}"),
            })?;
        Ok(Self { ws })
    }

    fn failure(&self, reason: impl Into<String>) -> TransportFailure {
        TransportFailure {
            kind: TransportKind::Websocket,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportFailure> {
        self.ws
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| self.failure(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportFailure>> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // ping/pong handled by tungstenite; binary frames are not
                // part of the protocol
                Ok(_) => {}
                Err(e) => return Some(Err(self.failure(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Websocket
    }
}

/// Rewrite an http(s) endpoint URL to its ws(s) equivalent.
fn ws_url(endpoint: &str) -> Result<Url, ConnectError> {
    let mut url = Url::parse(endpoint).map_err(|e| ConnectError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason: e.to_string(),
    })?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ConnectError::InvalidEndpoint {
                endpoint: endpoint.to_owned(),
                reason: format!("unsupported scheme {other}"),
            });
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| ConnectError::InvalidEndpoint {
            endpoint: endpoint.to_owned(),
            reason: "scheme rewrite failed".to_owned(),
        })?;
    Ok(url)
}
