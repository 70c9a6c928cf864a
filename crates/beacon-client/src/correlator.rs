//! Caller side of the request/response correlation.
//!
//! Bridges an `invoke` call to the connection actor: waits (bounded) for the
//! connection to be ready, registers the invocation, and awaits the oneshot
//! the actor resolves when the correlated broadcast arrives. The timeout runs
//! here, on the caller's future; on expiry the actor is told to drop the
//! pending entry so nothing leaks.

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Duration;

use beacon_core::envelope::Invocation;
use beacon_core::errors::InvokeError;

use crate::connection::{Command, Link};
use crate::state::ConnectionState;

/// Invoke a method and await its correlated result.
pub(crate) async fn invoke_on(
    link: &Link,
    channel: &str,
    method: &str,
    payload: Value,
    response_event: &str,
    timeout: Duration,
    ready_wait: Duration,
) -> Result<Value, InvokeError> {
    await_ready(link, ready_wait).await?;

    let invocation = Invocation::new(method, payload);
    let correlation_id = invocation.correlation_id.clone();
    let (reply_tx, reply_rx) = oneshot::channel();

    link.cmd_tx
        .send(Command::Invoke {
            channel: channel.to_owned(),
            invocation,
            response_event: response_event.to_owned(),
            reply: reply_tx,
        })
        .await
        .map_err(|_| InvokeError::NotConnected { waited_ms: 0 })?;

    match tokio::time::timeout(timeout, reply_rx).await {
        Ok(Ok(outcome)) => outcome,
        // actor exited with the request still registered
        Ok(Err(_)) => Err(InvokeError::NotConnected { waited_ms: 0 }),
        Err(_) => {
            let _ = link
                .cmd_tx
                .send(Command::CancelPending { correlation_id })
                .await;
            Err(InvokeError::Timeout {
                method: method.to_owned(),
                timeout_ms: millis(timeout),
            })
        }
    }
}

/// Wait up to `bound` for the connection to reach `Connected`.
///
/// Returns immediately on a terminal state: a call issued while the
/// connection is closed fails fast instead of hanging for the full bound.
pub(crate) async fn await_ready(link: &Link, bound: Duration) -> Result<(), InvokeError> {
    let mut rx = link.state_rx.clone();
    if *rx.borrow() == ConnectionState::Connected {
        return Ok(());
    }

    let reached = async {
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ConnectionState::Connected => return true,
                ConnectionState::Disconnected | ConnectionState::Closed => return false,
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    if rx.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    };

    match tokio::time::timeout(bound, reached).await {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(InvokeError::NotConnected {
            waited_ms: millis(bound),
        }),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}
