//! End-to-end tests against an in-process WebSocket stub of the
//! coordination service.
//!
//! Each test binds its own listener on an ephemeral port and scripts the
//! server side explicitly, so the protocol exchange under test is visible in
//! the test body.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use beacon_client::{BeaconClient, ConnectionState, InvokeError, channels};
use beacon_core::backoff::ReconnectSchedule;
use beacon_core::transport::TransportKind;
use beacon_settings::BeaconSettings;

// ── harness ─────────────────────────────────────────────────────────────────

/// Bind a stub listener and build settings pointing at it.
///
/// WebSocket only, immediate debounce, fast reconnects; tests that need
/// different knobs adjust the returned settings.
async fn bind_stub() -> (TcpListener, BeaconSettings) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut settings = BeaconSettings::default();
    settings.connection.endpoint_url = format!("http://{addr}/coordination");
    settings.connection.transport_order = vec![TransportKind::Websocket];
    settings.connection.handshake_timeout_ms = 2_000;
    settings.connection.ready_wait_ms = 2_000;
    settings.connection.reconnect_delays_ms = ReconnectSchedule::new(vec![0, 100]);
    settings.channels.default_debounce_ms = 0;
    settings.channels.default_timeout_ms = 2_000;
    (listener, settings)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

/// Read frames until an invocation (text frame) arrives.
async fn next_invocation(ws: &mut WebSocketStream<TcpStream>) -> Value {
    while let Some(msg) = ws.next().await {
        if let Message::Text(text) = msg.unwrap() {
            return serde_json::from_str(&text).unwrap();
        }
    }
    panic!("peer closed before an invocation arrived");
}

async fn send_frame(ws: &mut WebSocketStream<TcpStream>, frame: &Value) {
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

fn result_frame(event: &str, correlation_id: &Value, payload: Value) -> Value {
    json!({
        "event": event,
        "correlationId": correlation_id,
        "payload": payload,
    })
}

// ── correlation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn invocation_resolves_with_correlated_result() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let inv = next_invocation(&mut ws).await;
        assert_eq!(inv["method"], "ValidateEmail");
        assert_eq!(inv["payload"]["value"], "ada@@example");
        let reply = result_frame(
            "EmailValidationResult",
            &inv["correlationId"],
            json!({"isValid": false, "message": "invalid format"}),
        );
        send_frame(&mut ws, &reply).await;
    });

    let client = BeaconClient::new(settings);
    client.connect().await.unwrap();
    let verdict = client.validate_email("ada@@example").await.unwrap();
    assert!(!verdict.is_valid);
    assert_eq!(verdict.message, "invalid format");
    client.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn phone_validation_round_trips_country_code() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let inv = next_invocation(&mut ws).await;
        assert_eq!(inv["method"], "ValidatePhone");
        assert_eq!(inv["payload"]["countryCode"], "TR");
        let reply = result_frame(
            "PhoneValidationResult",
            &inv["correlationId"],
            json!({
                "isValid": true,
                "countryCode": "TR",
                "formattedNumber": "+90 532 123 45 67",
                "carrier": "Turkcell"
            }),
        );
        send_frame(&mut ws, &reply).await;
    });

    let client = BeaconClient::new(settings);
    client.connect().await.unwrap();
    let verdict = client.validate_phone("05321234567", "TR").await.unwrap();
    assert!(verdict.is_valid);
    assert_eq!(verdict.carrier.as_deref(), Some("Turkcell"));
    client.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn error_channel_reply_surfaces_as_server_error() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let inv = next_invocation(&mut ws).await;
        let reply = json!({
            "event": "error",
            "correlationId": inv["correlationId"],
            "code": "TENANT_STORE_DOWN",
            "message": "tenant registry unavailable",
        });
        send_frame(&mut ws, &reply).await;
    });

    let client = BeaconClient::new(settings);
    client.connect().await.unwrap();
    let err = client.check_tenant_code("acme").await.unwrap_err();
    assert_matches!(
        err,
        InvokeError::ServerError { code, .. } if code == "TENANT_STORE_DOWN"
    );
    client.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out_the_invocation() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        // swallow the invocation, never reply
        let _ = next_invocation(&mut ws).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = BeaconClient::new(settings);
    client.connect().await.unwrap();

    let started = Instant::now();
    let err = client
        .invoke_with_timeout(
            channels::EMAIL_VALIDATION,
            "ValidateEmail",
            json!({"value": "x"}),
            "EmailValidationResult",
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert_matches!(err, InvokeError::Timeout { timeout_ms: 100, .. });
    // the full window must elapse first; rejection may not fire early
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(1));

    client.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn newer_call_supersedes_pending_one() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        // hold the first invocation, answer only the second
        let _first = next_invocation(&mut ws).await;
        let second = next_invocation(&mut ws).await;
        let reply = result_frame(
            "TenantCodeResult",
            &second["correlationId"],
            json!({"available": true}),
        );
        send_frame(&mut ws, &reply).await;
    });

    let client = Arc::new(BeaconClient::new(settings));
    client.connect().await.unwrap();

    let older = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.check_tenant_code("acme").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let newer = client.check_tenant_code("acme-co").await.unwrap();

    assert!(newer.available);
    assert_matches!(
        older.await.unwrap().unwrap_err(),
        InvokeError::Superseded { channel } if channel == channels::TENANT_CODE
    );
    client.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn duplicate_correlated_broadcast_is_ignored() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;

        let inv = next_invocation(&mut ws).await;
        let reply = result_frame(
            "TenantCodeResult",
            &inv["correlationId"],
            json!({"available": true}),
        );
        send_frame(&mut ws, &reply).await;
        // duplicate delivery of the same correlated broadcast
        send_frame(&mut ws, &reply).await;

        let inv = next_invocation(&mut ws).await;
        let reply = result_frame(
            "TenantCodeResult",
            &inv["correlationId"],
            json!({"available": false}),
        );
        send_frame(&mut ws, &reply).await;
    });

    let client = BeaconClient::new(settings);
    client.connect().await.unwrap();

    let first = client.check_tenant_code("acme").await.unwrap();
    assert!(first.available);
    // the duplicate must not leak into the next call on the channel
    let second = client.check_tenant_code("acme").await.unwrap();
    assert!(!second.available);

    client.disconnect().await;
    server.await.unwrap();
}

// ── reconnection and replay ─────────────────────────────────────────────────

#[tokio::test]
async fn pending_invocation_replays_once_after_reconnect() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        // first connection: take the invocation, then drop mid-flight
        let mut ws = accept_ws(&listener).await;
        let original = next_invocation(&mut ws).await;
        drop(ws);

        // second connection: the same invocation arrives again, once
        let mut ws = accept_ws(&listener).await;
        let replayed = next_invocation(&mut ws).await;
        assert_eq!(replayed["correlationId"], original["correlationId"]);
        assert_eq!(replayed["method"], "CalculatePrice");

        let reply = result_frame(
            "PriceCalculationResult",
            &replayed["correlationId"],
            json!({"total": 49.0, "currency": "USD"}),
        );
        send_frame(&mut ws, &reply).await;

        // nothing further may be replayed; the close handshake from the
        // client's disconnect is not a replay
        let extra = tokio::time::timeout(Duration::from_millis(300), async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break Some(text),
                    Some(_) => {}
                    None => break None,
                }
            }
        })
        .await;
        assert!(
            !matches!(extra, Ok(Some(_))),
            "unexpected extra frame after replay: {extra:?}"
        );
    });

    let client = BeaconClient::new(settings);
    client.connect().await.unwrap();

    let quote = client
        .invoke(
            channels::PRICE_CALCULATION,
            "CalculatePrice",
            json!({"modules": ["crm"], "users": 3, "billingCycle": "monthly"}),
            "PriceCalculationResult",
        )
        .await
        .unwrap();
    assert_eq!(quote["total"], 49.0);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn exhausted_reconnects_close_the_connection_and_fail_pending() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _ = next_invocation(&mut ws).await;
        // refuse every reconnect attempt, then kill the live socket
        drop(listener);
        drop(ws);
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = Arc::new(BeaconClient::new(settings));
    client.connect().await.unwrap();

    let err = client
        .invoke(
            channels::TENANT_CODE,
            "CheckTenantCode",
            json!({"code": "acme"}),
            "TenantCodeResult",
        )
        .await
        .unwrap_err();
    assert_matches!(err, InvokeError::NotConnected { .. });

    // the actor settles into the terminal state
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    server.abort();
}

// ── lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn disconnect_during_reconnect_completes_promptly() {
    let (listener, mut settings) = bind_stub().await;
    // one attempt, far enough out that a queued disconnect would visibly hang
    settings.connection.reconnect_delays_ms = ReconnectSchedule::new(vec![60_000]);
    let server = tokio::spawn(async move {
        let ws = accept_ws(&listener).await;
        // let connect() settle on Connected before yanking the transport
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(ws);
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = BeaconClient::new(settings);
    client.connect().await.unwrap();

    // wait for the drop to be observed
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(client.state(), ConnectionState::Reconnecting);

    let started = Instant::now();
    client.disconnect().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(client.state(), ConnectionState::Closed);
    server.abort();
}

#[tokio::test]
async fn concurrent_connects_share_one_handshake() {
    let (listener, settings) = bind_stub().await;
    let handshakes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handshakes);
    let server = tokio::spawn(async move {
        loop {
            let mut ws = accept_ws(&listener).await;
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move { while ws.next().await.is_some() {} });
        }
    });

    let client = Arc::new(BeaconClient::new(settings));
    let (a, b) = tokio::join!(client.connect(), client.connect());
    a.unwrap();
    b.unwrap();
    // a repeat call on the live connection is also a no-op
    client.connect().await.unwrap();

    assert!(client.is_connected());
    assert_eq!(handshakes.load(Ordering::SeqCst), 1);

    client.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn disconnect_fails_inflight_invocations() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _ = next_invocation(&mut ws).await;
        // never reply; keep the socket open
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = Arc::new(BeaconClient::new(settings));
    client.connect().await.unwrap();

    let inflight = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.check_tenant_code("acme").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.disconnect().await;

    assert_matches!(
        inflight.await.unwrap().unwrap_err(),
        InvokeError::NotConnected { .. }
    );
    assert_eq!(client.state(), ConnectionState::Closed);
    server.abort();
}

#[tokio::test]
async fn reset_channel_supersedes_inflight_invocation() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let _ = next_invocation(&mut ws).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = Arc::new(BeaconClient::new(settings));
    client.connect().await.unwrap();

    let inflight = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.check_tenant_code("acme").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.reset_channel(channels::TENANT_CODE).await;

    assert_matches!(
        inflight.await.unwrap().unwrap_err(),
        InvokeError::Superseded { .. }
    );
    client.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn connect_against_dead_endpoint_fails_and_recovers_on_retry() {
    let (listener, settings) = bind_stub().await;
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BeaconClient::new(settings);
    // nothing is listening yet
    assert!(client.connect().await.is_err());
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // bring the service up on the same port and connect again
    let listener = TcpListener::bind(addr).await.unwrap();
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        while ws.next().await.is_some() {}
    });

    client.connect().await.unwrap();
    assert!(client.is_connected());
    client.disconnect().await;
    server.abort();
}

// ── debounce ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn debounce_collapses_a_burst_to_the_last_call() {
    let (listener, mut settings) = bind_stub().await;
    settings.channels.default_debounce_ms = 200;
    let invocations = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&invocations);
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        loop {
            let inv = next_invocation(&mut ws).await;
            let _ = counter.fetch_add(1, Ordering::SeqCst);
            let reply = result_frame(
                "EmailValidationResult",
                &inv["correlationId"],
                json!({"isValid": true, "message": inv["payload"]["value"]}),
            );
            send_frame(&mut ws, &reply).await;
        }
    });

    let client = Arc::new(BeaconClient::new(settings));
    client.connect().await.unwrap();

    // a typing burst: three keystrokes, 30ms apart
    let mut burst = Vec::new();
    for value in ["a", "ad", "ada"] {
        let client = Arc::clone(&client);
        burst.push(tokio::spawn(
            async move { client.validate_email(value).await },
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    let mut outcomes = Vec::new();
    for task in burst {
        outcomes.push(task.await.unwrap());
    }

    // only the last keystroke reaches the wire
    assert_matches!(&outcomes[0], Err(InvokeError::Superseded { .. }));
    assert_matches!(&outcomes[1], Err(InvokeError::Superseded { .. }));
    let winner = outcomes[2].as_ref().unwrap();
    assert_eq!(winner.message, "ada");
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    client.disconnect().await;
    server.abort();
}

// ── notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn uncorrelated_broadcasts_route_to_consumers_and_history() {
    let (listener, settings) = bind_stub().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        for (kind, sku) in [("stock-alert", "SKU-1"), ("stock-alert", "SKU-2")] {
            let frame = json!({
                "event": "StockAlert",
                "kind": kind,
                "severity": "critical",
                "payload": {"sku": sku, "remaining": 0},
            });
            send_frame(&mut ws, &frame).await;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = BeaconClient::new(settings);
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
    let _sub = client.on_notification("stock-alert", move |n| {
        let _ = seen_tx.send(n.payload["sku"].clone());
    });

    client.connect().await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "SKU-1");
    assert_eq!(second, "SKU-2");

    // history is recorded after consumers run; give the actor a beat
    tokio::time::sleep(Duration::from_millis(50)).await;
    let history = client.recent_notifications("stock-alert");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].payload["sku"], "SKU-1");

    client.disconnect().await;
    server.abort();
}
