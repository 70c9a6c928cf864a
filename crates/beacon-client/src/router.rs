//! Notification router for unsolicited server pushes.
//!
//! Broadcasts without a correlation ID are classified by their `kind` tag and
//! fanned out synchronously to every registered consumer for that kind (plus
//! catch-all consumers). Consumers are isolated from each other: one panicking
//! consumer is logged and the rest still run. The router also keeps a bounded
//! recent-history buffer per kind.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use beacon_core::envelope::{Broadcast, Severity};
use beacon_core::ids::SubscriptionId;

/// An inbound notification, never mutated after receipt.
#[derive(Clone, Debug)]
pub struct Notification {
    /// Classification tag (falls back to the event name when absent).
    pub kind: String,
    /// Broadcast event name on the wire.
    pub event: String,
    /// Severity declared by the service.
    pub severity: Severity,
    /// Domain payload.
    pub payload: Value,
    /// Server emission time, or receipt time when the server omitted it.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub(crate) fn from_broadcast(broadcast: Broadcast) -> Self {
        let kind = broadcast
            .kind
            .clone()
            .unwrap_or_else(|| broadcast.event.clone());
        Self {
            kind,
            event: broadcast.event,
            severity: broadcast.severity.unwrap_or_default(),
            payload: broadcast.payload,
            timestamp: broadcast.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Default)]
struct Registry {
    by_kind: HashMap<String, Vec<(SubscriptionId, Handler)>>,
    catch_all: Vec<(SubscriptionId, Handler)>,
    history: HashMap<String, VecDeque<Notification>>,
}

/// Dispatches inbound notifications to typed consumers.
pub struct NotificationRouter {
    registry: RwLock<Registry>,
    history_limit: usize,
}

impl NotificationRouter {
    /// Create a router keeping at most `history_limit` recent notifications
    /// per kind.
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            history_limit,
        }
    }

    /// Register a consumer for one notification kind.
    ///
    /// The returned [`Subscription`] unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        kind: impl Into<String>,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        let kind = kind.into();
        let id = SubscriptionId::new();
        self.registry
            .write()
            .by_kind
            .entry(kind.clone())
            .or_default()
            .push((id.clone(), Arc::new(handler)));
        Subscription {
            router: Arc::downgrade(self),
            id,
            kind: Some(kind),
        }
    }

    /// Register a consumer for every notification kind.
    pub fn subscribe_all(
        self: &Arc<Self>,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Subscription {
        let id = SubscriptionId::new();
        self.registry
            .write()
            .catch_all
            .push((id.clone(), Arc::new(handler)));
        Subscription {
            router: Arc::downgrade(self),
            id,
            kind: None,
        }
    }

    /// Recent notifications of one kind, oldest first.
    #[must_use]
    pub fn recent(&self, kind: &str) -> Vec<Notification> {
        self.registry
            .read()
            .history
            .get(kind)
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Classify and fan out one inbound broadcast.
    ///
    /// Handlers run synchronously in registration order; a panicking handler
    /// is isolated and logged.
    pub(crate) fn dispatch(&self, broadcast: Broadcast) {
        let notification = Notification::from_broadcast(broadcast);

        // Snapshot handlers so consumers can (un)subscribe from inside a
        // callback without deadlocking.
        let handlers: Vec<Handler> = {
            let registry = self.registry.read();
            registry
                .by_kind
                .get(&notification.kind)
                .into_iter()
                .flatten()
                .chain(registry.catch_all.iter())
                .map(|(_, h)| Arc::clone(h))
                .collect()
        };

        debug!(
            kind = %notification.kind,
            consumers = handlers.len(),
            "dispatching notification"
        );

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&notification))).is_err() {
                warn!(kind = %notification.kind, "notification consumer panicked");
            }
        }

        let mut registry = self.registry.write();
        let buf = registry
            .history
            .entry(notification.kind.clone())
            .or_default();
        buf.push_back(notification);
        while buf.len() > self.history_limit {
            let _ = buf.pop_front();
        }
    }

    fn unsubscribe(&self, kind: Option<&str>, id: &SubscriptionId) {
        let mut registry = self.registry.write();
        match kind {
            Some(kind) => {
                if let Some(handlers) = registry.by_kind.get_mut(kind) {
                    handlers.retain(|(h_id, _)| h_id != id);
                }
            }
            None => registry.catch_all.retain(|(h_id, _)| h_id != id),
        }
    }
}

/// A consumer registration. Dropping it deregisters the consumer.
pub struct Subscription {
    router: Weak<NotificationRouter>,
    id: SubscriptionId,
    kind: Option<String>,
}

impl Subscription {
    /// Deregister explicitly (equivalent to dropping).
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(router) = self.router.upgrade() {
            router.unsubscribe(self.kind.as_deref(), &self.id);
        }
    }
}
