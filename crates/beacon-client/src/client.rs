//! Public client facade.
//!
//! A [`BeaconClient`] owns its configuration, its notification router and at
//! most one live connection actor. Everything is instance state: two clients
//! in one process are fully independent, and tests get an isolated client
//! per case.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Duration;

use beacon_core::errors::{ConnectError, InvokeError};
use beacon_settings::BeaconSettings;

use crate::connection::{self, Command, Link};
use crate::correlator;
use crate::debounce::DebounceGate;
use crate::router::{Notification, NotificationRouter, Subscription};
use crate::state::ConnectionState;

/// Realtime coordination client.
pub struct BeaconClient {
    settings: BeaconSettings,
    router: Arc<NotificationRouter>,
    gate: DebounceGate,
    link: RwLock<Option<Link>>,
    connect_lock: tokio::sync::Mutex<()>,
}

impl BeaconClient {
    /// Create a client from the given settings. No connection is made until
    /// [`connect`](Self::connect).
    #[must_use]
    pub fn new(settings: BeaconSettings) -> Self {
        let router = Arc::new(NotificationRouter::new(settings.notifications.history_limit));
        Self {
            settings,
            router,
            gate: DebounceGate::new(),
            link: RwLock::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The settings this client was built with.
    #[must_use]
    pub fn settings(&self) -> &BeaconSettings {
        &self.settings
    }

    /// Establish the connection, or join one already live.
    ///
    /// Idempotent: concurrent and repeated calls share a single handshake and
    /// all resolve when it settles. After a failure (or an explicit
    /// disconnect) the next call starts a fresh connection.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let _guard = self.connect_lock.lock().await;

        let link = {
            let current = self.link.read().clone();
            match current {
                Some(link) if link.is_live() => link,
                _ => {
                    let link =
                        connection::spawn(self.settings.clone(), Arc::clone(&self.router));
                    *self.link.write() = Some(link.clone());
                    link
                }
            }
        };

        link.await_established(&self.settings.connection.endpoint_url)
            .await
    }

    /// Tear the connection down and fail anything in flight.
    ///
    /// Idempotent; a later [`connect`](Self::connect) starts over.
    pub async fn disconnect(&self) {
        let link = self.link.read().clone();
        if let Some(link) = link {
            let (done_tx, done_rx) = oneshot::channel();
            if link
                .cmd_tx
                .send(Command::Disconnect { done: done_tx })
                .await
                .is_ok()
            {
                let _ = done_rx.await;
            }
        }
        self.gate.reset_all();
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.link
            .read()
            .as_ref()
            .map_or(ConnectionState::Disconnected, Link::state)
    }

    /// Whether the connection is established right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Invoke a method on a channel and await its correlated result, using
    /// the channel's configured timeout.
    ///
    /// At most one invocation is pending per channel: a newer call supersedes
    /// the older one, which resolves with [`InvokeError::Superseded`].
    pub async fn invoke(
        &self,
        channel: &str,
        method: &str,
        payload: Value,
        response_event: &str,
    ) -> Result<Value, InvokeError> {
        let timeout = Duration::from_millis(self.settings.channels.timeout_ms(channel));
        self.invoke_with_timeout(channel, method, payload, response_event, timeout)
            .await
    }

    /// [`invoke`](Self::invoke) with an explicit timeout.
    pub async fn invoke_with_timeout(
        &self,
        channel: &str,
        method: &str,
        payload: Value,
        response_event: &str,
        timeout: Duration,
    ) -> Result<Value, InvokeError> {
        let link = self
            .current_link()
            .ok_or(InvokeError::NotConnected { waited_ms: 0 })?;
        let ready_wait = Duration::from_millis(self.settings.connection.ready_wait_ms);
        correlator::invoke_on(
            &link,
            channel,
            method,
            payload,
            response_event,
            timeout,
            ready_wait,
        )
        .await
    }

    /// [`invoke`](Self::invoke) behind the channel's debounce window.
    ///
    /// The call holds for the window; if a newer call lands on the channel
    /// meanwhile, this one resolves with [`InvokeError::Superseded`] and only
    /// the newest proceeds to the wire. A zero window invokes immediately.
    pub async fn invoke_debounced(
        &self,
        channel: &str,
        method: &str,
        payload: Value,
        response_event: &str,
    ) -> Result<Value, InvokeError> {
        let window = self.settings.channels.debounce_ms(channel);
        let generation = self.gate.register(channel);
        if window > 0 {
            tokio::time::sleep(Duration::from_millis(window)).await;
            if !self.gate.is_current(channel, generation) {
                return Err(InvokeError::Superseded {
                    channel: channel.to_owned(),
                });
            }
        }
        self.invoke(channel, method, payload, response_event).await
    }

    /// Cancel the channel's pending debounce and supersede its in-flight
    /// invocation, if any.
    pub async fn reset_channel(&self, channel: &str) {
        self.gate.reset(channel);
        if let Some(link) = self.current_link() {
            let _ = link
                .cmd_tx
                .send(Command::ResetChannel {
                    channel: channel.to_owned(),
                })
                .await;
        }
    }

    /// Register a consumer for one notification kind.
    pub fn on_notification(
        &self,
        kind: impl Into<String>,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        self.router.subscribe(kind, handler)
    }

    /// Register a consumer for every notification kind.
    pub fn on_any_notification(
        &self,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        self.router.subscribe_all(handler)
    }

    /// Recent notifications of one kind, oldest first.
    #[must_use]
    pub fn recent_notifications(&self, kind: &str) -> Vec<Notification> {
        self.router.recent(kind)
    }

    fn current_link(&self) -> Option<Link> {
        self.link.read().clone()
    }
}
