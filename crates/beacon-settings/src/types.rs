//! Settings tree for the coordination client.
//!
//! Field names are camelCase in the settings file, matching the rest of the
//! suite's configuration. Every field has a compiled default so a missing or
//! partial file always yields a usable configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use beacon_core::backoff::ReconnectSchedule;
use beacon_core::transport::TransportKind;

/// Default coordination endpoint.
pub const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:5179/coordination";
/// Default transport handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
/// Default bound an invoke waits for readiness before `NotConnected`.
pub const DEFAULT_READY_WAIT_MS: u64 = 2_000;
/// Default debounce window for free-text channels.
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;
/// Default per-invoke timeout.
pub const DEFAULT_INVOKE_TIMEOUT_MS: u64 = 5_000;
/// Default bounded notification history per kind.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Root settings for the coordination client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// Connection and transport settings.
    pub connection: ConnectionSettings,
    /// Channel debounce/timeout settings.
    pub channels: ChannelSettings,
    /// Unsolicited notification settings.
    pub notifications: NotificationSettings,
}

/// Connection and transport negotiation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Coordination service endpoint (http/https; rewritten per transport).
    pub endpoint_url: String,
    /// Transport preference order, most capable first.
    pub transport_order: Vec<TransportKind>,
    /// Handshake timeout per transport attempt.
    pub handshake_timeout_ms: u64,
    /// How long an invoke waits for `Connected` before `NotConnected`.
    pub ready_wait_ms: u64,
    /// Reconnect delay schedule; empty disables automatic reconnection.
    pub reconnect_delays_ms: ReconnectSchedule,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_owned(),
            transport_order: TransportKind::PREFERENCE_ORDER.to_vec(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            ready_wait_ms: DEFAULT_READY_WAIT_MS,
            reconnect_delays_ms: ReconnectSchedule::default(),
        }
    }
}

/// Per-channel override of the channel defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelOverride {
    /// Debounce window override. Zero means fire immediately.
    pub debounce_ms: Option<u64>,
    /// Invoke timeout override.
    pub timeout_ms: Option<u64>,
}

/// Channel debounce and timeout settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Debounce window applied when a channel has no override.
    pub default_debounce_ms: u64,
    /// Invoke timeout applied when a channel has no override.
    pub default_timeout_ms: u64,
    /// Per-channel overrides, keyed by channel key.
    pub overrides: HashMap<String, ChannelOverride>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        // Structural selection channels fire immediately; free-text channels
        // get the default window.
        let mut overrides = HashMap::new();
        let _ = overrides.insert(
            "price-calculation".to_owned(),
            ChannelOverride {
                debounce_ms: Some(0),
                timeout_ms: None,
            },
        );
        Self {
            default_debounce_ms: DEFAULT_DEBOUNCE_MS,
            default_timeout_ms: DEFAULT_INVOKE_TIMEOUT_MS,
            overrides,
        }
    }
}

impl ChannelSettings {
    /// Effective debounce window for a channel.
    #[must_use]
    pub fn debounce_ms(&self, channel: &str) -> u64 {
        self.overrides
            .get(channel)
            .and_then(|o| o.debounce_ms)
            .unwrap_or(self.default_debounce_ms)
    }

    /// Effective invoke timeout for a channel.
    #[must_use]
    pub fn timeout_ms(&self, channel: &str) -> u64 {
        self.overrides
            .get(channel)
            .and_then(|o| o.timeout_ms)
            .unwrap_or(self.default_timeout_ms)
    }
}

/// Unsolicited notification settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    /// Bounded recent-history size kept per notification kind.
    pub history_limit: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}
