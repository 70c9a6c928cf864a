//! Long-polling transport. Last rung of the degradation ladder.
//!
//! Inbound: `GET <endpoint>/poll?wait=<seconds>` returns a JSON array of
//! broadcast frames (empty when the wait elapsed with nothing to deliver).
//! Outbound: POST to `<endpoint>/send`, same as the SSE transport.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::Value;

use beacon_core::errors::ConnectError;
use beacon_core::transport::TransportKind;

use super::{Transport, TransportFailure, endpoint_join};

/// Seconds the server holds a poll open before returning an empty batch.
const POLL_WAIT_SECS: u32 = 25;

/// Long-poll transport with a local frame queue.
#[derive(Debug)]
pub(crate) struct PollingTransport {
    client: reqwest::Client,
    poll_url: String,
    send_url: String,
    queue: VecDeque<String>,
}

impl PollingTransport {
    /// Probe the poll endpoint (zero wait) to verify it exists.
    pub(crate) async fn connect(endpoint: &str) -> Result<Self, ConnectError> {
        let client = reqwest::Client::new();
        let poll_url = endpoint_join(endpoint, "poll");

        let response = client
            .get(format!("{poll_url}?wait=0"))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ConnectError::HandshakeFailed {
                endpoint: endpoint.to_owned(),
                reason: format!("poll probe: {e}"),
            })?;

        let frames: Vec<Value> =
            response
                .json()
                .await
                .map_err(|e| ConnectError::HandshakeFailed {
                    endpoint: endpoint.to_owned(),
                    reason: format!("poll probe body: {e}"),
                })?;

        Ok(Self {
            client,
            poll_url,
            send_url: endpoint_join(endpoint, "send"),
            queue: frames.iter().map(Value::to_string).collect(),
        })
    }

    fn failure(reason: impl Into<String>) -> TransportFailure {
        TransportFailure {
            kind: TransportKind::Polling,
            reason: reason.into(),
        }
    }

    async fn poll_batch(&mut self) -> Result<(), TransportFailure> {
        let response = self
            .client
            .get(format!("{}?wait={POLL_WAIT_SECS}", self.poll_url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Self::failure(e.to_string()))?;
        let frames: Vec<Value> = response
            .json()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;
        self.queue.extend(frames.iter().map(Value::to_string));
        Ok(())
    }
}

#[async_trait]
impl Transport for PollingTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportFailure> {
        let response = self
            .client
            .post(&self.send_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(frame)
            .send()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;
        let _ = response
            .error_for_status()
            .map_err(|e| Self::failure(e.to_string()))?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportFailure>> {
        loop {
            if let Some(frame) = self.queue.pop_front() {
                return Some(Ok(frame));
            }
            if let Err(e) = self.poll_batch().await {
                return Some(Err(e));
            }
        }
    }

    async fn close(&mut self) {
        self.queue.clear();
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }
}
