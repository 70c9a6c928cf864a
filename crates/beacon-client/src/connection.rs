//! Connection lifecycle actor.
//!
//! One task owns the transport, the pending-request map and the state
//! machine; everything else talks to it through a command channel and
//! observes it through a `watch`. This keeps a single writer for all shared
//! connection state.
//!
//! The actor demultiplexes inbound frames by correlation ID: correlated
//! broadcasts settle the matching pending request, uncorrelated ones go to
//! the notification router. On an unexpected transport loss it reconnects on
//! the configured schedule and replays in-flight invocations once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Duration;
use tracing::{debug, info, warn};

use beacon_core::envelope::{Broadcast, Invocation};
use beacon_core::errors::{ConnectError, InvokeError};
use beacon_core::ids::CorrelationId;
use beacon_settings::BeaconSettings;

use crate::router::NotificationRouter;
use crate::state::ConnectionState;
use crate::transport::{self, Transport};

/// Command channel depth. Invocations are UI-driven; 64 is plenty.
const COMMAND_BUFFER: usize = 64;

/// Commands accepted by the connection actor.
pub(crate) enum Command {
    /// Send an invocation and register its pending request.
    Invoke {
        channel: String,
        invocation: Invocation,
        response_event: String,
        reply: oneshot::Sender<Result<Value, InvokeError>>,
    },
    /// Remove a pending request whose caller gave up (timeout path).
    CancelPending { correlation_id: CorrelationId },
    /// Supersede whatever is pending on a channel.
    ResetChannel { channel: String },
    /// Tear down the transport and close.
    Disconnect { done: oneshot::Sender<()> },
}

/// Handles to a running connection actor.
#[derive(Clone)]
pub(crate) struct Link {
    pub(crate) cmd_tx: mpsc::Sender<Command>,
    pub(crate) state_rx: watch::Receiver<ConnectionState>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl Link {
    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.state().is_live()
    }

    /// Wait for the handshake outcome: `Connected`, or a terminal state.
    pub(crate) async fn await_established(&self, endpoint: &str) -> Result<(), ConnectError> {
        let mut rx = self.state_rx.clone();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {
                    return Err(ConnectError::HandshakeFailed {
                        endpoint: endpoint.to_owned(),
                        reason: self.take_error(),
                    });
                }
                ConnectionState::Closed => return Err(ConnectError::Closed),
                ConnectionState::Connecting | ConnectionState::Reconnecting => {
                    if rx.changed().await.is_err() {
                        return Err(ConnectError::HandshakeFailed {
                            endpoint: endpoint.to_owned(),
                            reason: "connection task exited".to_owned(),
                        });
                    }
                }
            }
        }
    }

    fn take_error(&self) -> String {
        self.last_error
            .lock()
            .take()
            .unwrap_or_else(|| "handshake failed".to_owned())
    }
}

/// Spawn a connection actor for the configured endpoint.
pub(crate) fn spawn(settings: BeaconSettings, router: Arc<NotificationRouter>) -> Link {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let last_error = Arc::new(Mutex::new(None));

    let actor = ConnectionActor {
        settings,
        router,
        cmd_rx,
        state_tx,
        last_error: Arc::clone(&last_error),
        pending: HashMap::new(),
        by_channel: HashMap::new(),
    };
    let _handle = tokio::spawn(actor.run());

    Link {
        cmd_tx,
        state_rx,
        last_error,
    }
}

/// One outstanding invocation awaiting its correlated broadcast.
struct Pending {
    channel: String,
    response_event: String,
    invocation: Invocation,
    reply: oneshot::Sender<Result<Value, InvokeError>>,
    replayed: bool,
    issued_at: Instant,
}

/// Why the drive loop returned.
enum Driven {
    /// Explicit disconnect, or the client handle was dropped.
    Disconnect(Option<oneshot::Sender<()>>),
    /// The transport failed; reconnection may follow.
    Lost(String),
}

/// Outcome of the reconnect path.
enum Recovered {
    /// A fresh transport was negotiated.
    Transport(Box<dyn Transport>),
    /// The schedule ran out without a successful handshake.
    Exhausted,
    /// Disconnect requested (or the client handle dropped) mid-schedule.
    Stopped(Option<oneshot::Sender<()>>),
}

struct ConnectionActor {
    settings: BeaconSettings,
    router: Arc<NotificationRouter>,
    cmd_rx: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    last_error: Arc<Mutex<Option<String>>>,
    pending: HashMap<CorrelationId, Pending>,
    by_channel: HashMap<String, CorrelationId>,
}

impl ConnectionActor {
    async fn run(mut self) {
        info!(endpoint = %self.settings.connection.endpoint_url, "connecting");
        let mut transport = match transport::negotiate(&self.settings.connection).await {
            Ok(t) => t,
            Err(err) => {
                warn!(error = %err, "initial handshake failed");
                *self.last_error.lock() = Some(err.to_string());
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        };
        info!(transport = %transport.kind(), "connected");
        self.set_state(ConnectionState::Connected);

        loop {
            match self.drive(&mut transport).await {
                Driven::Disconnect(done) => {
                    transport.close().await;
                    self.fail_all_pending();
                    self.set_state(ConnectionState::Closed);
                    info!("connection closed");
                    if let Some(done) = done {
                        let _ = done.send(());
                    }
                    return;
                }
                Driven::Lost(mut reason) => loop {
                    warn!(%reason, "transport lost");
                    self.set_state(ConnectionState::Reconnecting);
                    match self.reconnect().await {
                        Recovered::Transport(new_transport) => {
                            transport = new_transport;
                            match self.replay_pending(&mut transport).await {
                                Ok(()) => {
                                    self.set_state(ConnectionState::Connected);
                                    info!(transport = %transport.kind(), "reconnected");
                                    break;
                                }
                                // the fresh transport failed during replay;
                                // treat it as lost and keep reconnecting
                                Err(replay_err) => reason = format!("replay: {replay_err}"),
                            }
                        }
                        Recovered::Exhausted => {
                            self.fail_all_pending();
                            self.set_state(ConnectionState::Closed);
                            warn!("reconnect schedule exhausted, closing");
                            return;
                        }
                        Recovered::Stopped(done) => {
                            self.fail_all_pending();
                            self.set_state(ConnectionState::Closed);
                            info!("connection closed");
                            if let Some(done) = done {
                                let _ = done.send(());
                            }
                            return;
                        }
                    }
                },
            }
        }
    }

    /// Pump commands and inbound frames until the transport dies or a
    /// disconnect is requested.
    async fn drive(&mut self, transport: &mut Box<dyn Transport>) -> Driven {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    None => return Driven::Disconnect(None),
                    Some(Command::Disconnect { done }) => return Driven::Disconnect(Some(done)),
                    Some(Command::CancelPending { correlation_id }) => {
                        if self.take_pending(&correlation_id).is_some() {
                            debug!(%correlation_id, "pending request cancelled by caller");
                        }
                    }
                    Some(Command::ResetChannel { channel }) => self.supersede_channel(&channel),
                    Some(Command::Invoke { channel, invocation, response_event, reply }) => {
                        if let Some(reason) = self
                            .handle_invoke(transport, channel, invocation, response_event, reply)
                            .await
                        {
                            return Driven::Lost(reason);
                        }
                    }
                },
                msg = transport.recv() => match msg {
                    Some(Ok(frame)) => self.handle_frame(&frame),
                    Some(Err(err)) => return Driven::Lost(err.to_string()),
                    None => return Driven::Lost("stream closed by peer".to_owned()),
                },
            }
        }
    }

    /// Register the pending request and send the invocation.
    ///
    /// Returns a reason string when the transport must be considered lost.
    async fn handle_invoke(
        &mut self,
        transport: &mut Box<dyn Transport>,
        channel: String,
        invocation: Invocation,
        response_event: String,
        reply: oneshot::Sender<Result<Value, InvokeError>>,
    ) -> Option<String> {
        self.supersede_channel(&channel);

        let wire = match invocation.to_wire() {
            Ok(wire) => wire,
            Err(err) => {
                let _ = reply.send(Err(InvokeError::TransportError {
                    reason: format!("encode: {err}"),
                }));
                return None;
            }
        };

        let correlation_id = invocation.correlation_id.clone();
        debug!(%channel, method = %invocation.method, %correlation_id, "invoking");
        let _ = self.by_channel.insert(channel.clone(), correlation_id.clone());
        let _ = self.pending.insert(
            correlation_id.clone(),
            Pending {
                channel,
                response_event,
                invocation,
                reply,
                replayed: false,
                issued_at: Instant::now(),
            },
        );

        match transport.send(wire).await {
            Ok(()) => None,
            Err(err) => {
                if let Some(pending) = self.take_pending(&correlation_id) {
                    let _ = pending.reply.send(Err(InvokeError::TransportError {
                        reason: err.to_string(),
                    }));
                }
                Some(err.to_string())
            }
        }
    }

    /// Demultiplex one inbound frame.
    fn handle_frame(&mut self, frame: &str) {
        let Ok(broadcast) = Broadcast::from_wire(frame) else {
            warn!("undecodable frame from service");
            return;
        };

        let Some(correlation_id) = broadcast.correlation_id.clone() else {
            self.router.dispatch(broadcast);
            return;
        };

        // Removing the pending entry before resolving makes duplicate
        // broadcasts and late replays for superseded requests no-ops.
        let Some(pending) = self.take_pending(&correlation_id) else {
            debug!(%correlation_id, "broadcast for unknown or superseded request");
            return;
        };

        let outcome = if broadcast.is_error() {
            Err(InvokeError::ServerError {
                code: broadcast.code.unwrap_or_else(|| "UNKNOWN".to_owned()),
                message: broadcast.message.unwrap_or_default(),
            })
        } else {
            if broadcast.event != pending.response_event {
                debug!(
                    expected = %pending.response_event,
                    got = %broadcast.event,
                    "response event name mismatch"
                );
            }
            Ok(broadcast.payload)
        };

        debug!(
            channel = %pending.channel,
            elapsed_ms = %pending.issued_at.elapsed().as_millis(),
            "request settled"
        );
        let _ = pending.reply.send(outcome);
    }

    /// Cancel whatever is pending on a channel in favor of a newer call.
    fn supersede_channel(&mut self, channel: &str) {
        if let Some(old_id) = self.by_channel.remove(channel) {
            if let Some(old) = self.pending.remove(&old_id) {
                debug!(%channel, correlation_id = %old_id, "superseding pending request");
                let _ = old.reply.send(Err(InvokeError::Superseded {
                    channel: channel.to_owned(),
                }));
            }
        }
    }

    /// Remove a pending request from both indexes.
    fn take_pending(&mut self, correlation_id: &CorrelationId) -> Option<Pending> {
        let pending = self.pending.remove(correlation_id)?;
        if self.by_channel.get(&pending.channel) == Some(correlation_id) {
            let _ = self.by_channel.remove(&pending.channel);
        }
        Some(pending)
    }

    /// Retry the handshake on the configured schedule.
    ///
    /// Commands keep being serviced between and during attempts, so an
    /// explicit disconnect interrupts the schedule instead of queueing
    /// behind it.
    async fn reconnect(&mut self) -> Recovered {
        let conn = self.settings.connection.clone();
        let schedule = conn.reconnect_delays_ms.clone();
        for attempt in 0..schedule.max_attempts() {
            if let Some(delay_ms) = schedule.delay_for_attempt(attempt) {
                if delay_ms > 0 {
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                        stop = self.pump_commands_until_stop() => return stop,
                    }
                }
            }
            info!(attempt = attempt + 1, "reconnect attempt");
            tokio::select! {
                outcome = transport::negotiate(&conn) => match outcome {
                    Ok(t) => return Recovered::Transport(t),
                    Err(err) => warn!(error = %err, "reconnect attempt failed"),
                },
                stop = self.pump_commands_until_stop() => return stop,
            }
        }
        *self.last_error.lock() = Some(
            ConnectError::RetriesExhausted {
                attempts: schedule.max_attempts(),
            }
            .to_string(),
        );
        Recovered::Exhausted
    }

    /// Service commands while no transport exists. Completes only when the
    /// actor must stop.
    ///
    /// Invocations that race past a readiness check while the transport is
    /// down are registered unsent; the replay pass after the next successful
    /// handshake carries them out.
    async fn pump_commands_until_stop(&mut self) -> Recovered {
        loop {
            match self.cmd_rx.recv().await {
                None => return Recovered::Stopped(None),
                Some(Command::Disconnect { done }) => return Recovered::Stopped(Some(done)),
                Some(Command::CancelPending { correlation_id }) => {
                    let _ = self.take_pending(&correlation_id);
                }
                Some(Command::ResetChannel { channel }) => self.supersede_channel(&channel),
                Some(Command::Invoke {
                    channel,
                    invocation,
                    response_event,
                    reply,
                }) => {
                    self.supersede_channel(&channel);
                    let correlation_id = invocation.correlation_id.clone();
                    let _ = self.by_channel.insert(channel.clone(), correlation_id.clone());
                    let _ = self.pending.insert(
                        correlation_id,
                        Pending {
                            channel,
                            response_event,
                            invocation,
                            reply,
                            replayed: false,
                            issued_at: Instant::now(),
                        },
                    );
                }
            }
        }
    }

    /// Re-send in-flight invocations that have not already been replayed.
    ///
    /// Each pending request is replayed at most once, ever: a replay that is
    /// itself lost falls through to the caller's timeout.
    async fn replay_pending(&mut self, transport: &mut Box<dyn Transport>) -> Result<(), String> {
        let ids: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|(_, p)| !p.replayed)
            .map(|(id, _)| id.clone())
            .collect();

        for correlation_id in ids {
            let wire = {
                let Some(pending) = self.pending.get_mut(&correlation_id) else {
                    continue;
                };
                pending.replayed = true;
                info!(
                    channel = %pending.channel,
                    %correlation_id,
                    "replaying in-flight invocation"
                );
                match pending.invocation.to_wire() {
                    Ok(wire) => wire,
                    Err(err) => {
                        if let Some(pending) = self.take_pending(&correlation_id) {
                            let _ = pending.reply.send(Err(InvokeError::TransportError {
                                reason: format!("encode: {err}"),
                            }));
                        }
                        continue;
                    }
                }
            };
            transport.send(wire).await.map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Fail every pending request; the connection is going away.
    fn fail_all_pending(&mut self) {
        self.by_channel.clear();
        for (_, pending) in self.pending.drain() {
            let _ = pending
                .reply
                .send(Err(InvokeError::NotConnected { waited_ms: 0 }));
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let current = *self.state_tx.borrow();
        if current == next {
            return;
        }
        debug_assert!(
            current.can_transition_to(next),
            "illegal connection state transition {current} -> {next}"
        );
        info!(from = %current, to = %next, "connection state");
        let _ = self.state_tx.send(next);
    }
}
