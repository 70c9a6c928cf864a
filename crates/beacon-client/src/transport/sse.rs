//! Server-sent-events transport.
//!
//! Inbound frames arrive on a long-lived HTTP stream (`GET <endpoint>/stream`,
//! `text/event-stream`); outbound invocations go as individual POSTs to
//! `<endpoint>/send`. Used when a WebSocket cannot be established.

use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::Stream;
use futures::StreamExt;
use std::pin::Pin;

use beacon_core::errors::ConnectError;
use beacon_core::transport::TransportKind;

use super::{Transport, TransportFailure, endpoint_join};

type EventStream =
    Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// SSE-downstream, POST-upstream transport.
pub(crate) struct SseTransport {
    client: reqwest::Client,
    send_url: String,
    events: EventStream,
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("send_url", &self.send_url)
            .finish_non_exhaustive()
    }
}

impl SseTransport {
    /// Open the event stream and verify the endpoint accepts it.
    pub(crate) async fn connect(endpoint: &str) -> Result<Self, ConnectError> {
        let client = reqwest::Client::new();
        let stream_url = endpoint_join(endpoint, "stream");

        let response = client
            .get(&stream_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ConnectError::HandshakeFailed {
                endpoint: endpoint.to_owned(),
                reason: format!("SSE stream: {e}"),
            })?;

        let events: EventStream = Box::pin(response.bytes_stream().eventsource());

        Ok(Self {
            client,
            send_url: endpoint_join(endpoint, "send"),
            events,
        })
    }

    fn failure(reason: impl Into<String>) -> TransportFailure {
        TransportFailure {
            kind: TransportKind::Sse,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
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
        match self.events.next().await? {
            Ok(event) => Some(Ok(event.data)),
            Err(e) => Some(Err(Self::failure(e.to_string()))),
        }
    }

    async fn close(&mut self) {
        // Dropping the stream closes the HTTP connection.
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }
}
