//! Wire envelopes exchanged with the coordination service.
//!
//! The transport carries JSON text frames in both directions:
//!
//! - [`Invocation`] — client → service: a named method call with a generated
//!   correlation ID. The service echoes the ID on the result broadcast.
//! - [`Broadcast`] — service → client: either a correlated response (carries
//!   `correlationId`), an error-channel broadcast (`event == "error"`), or an
//!   unsolicited notification (no correlation ID, carries `kind`/`severity`).
//!
//! Field names are camelCase on the wire; the service and the other suite
//! front-ends depend on the exact strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::CorrelationId;

/// Event name used by the service's error channel.
pub const ERROR_EVENT: &str = "error";

/// Client → service invocation frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invocation {
    /// Method name on the coordination service, e.g. `"ValidateEmail"`.
    pub method: String,
    /// Generated per-request correlation ID, echoed on the response.
    pub correlation_id: CorrelationId,
    /// Method arguments.
    pub payload: Value,
}

impl Invocation {
    /// Build an invocation with a fresh correlation ID.
    #[must_use]
    pub fn new(method: impl Into<String>, payload: Value) -> Self {
        Self {
            method: method.into(),
            correlation_id: CorrelationId::new(),
            payload,
        }
    }

    /// Serialize to the wire text frame.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Notification severity, as declared by the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational push.
    #[default]
    Info,
    /// Needs attention but not urgent.
    Warning,
    /// Urgent condition (e.g. stock depleted).
    Critical,
}

/// Service → client broadcast frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    /// Broadcast event name, e.g. `"EmailValidationResult"` or `"StockAlert"`.
    pub event: String,
    /// Present on correlated responses and error-channel broadcasts only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Classification tag for unsolicited notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Severity for unsolicited notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Error code, set on error-channel broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable error message, set on error-channel broadcasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Domain payload.
    #[serde(default)]
    pub payload: Value,
    /// Server-side emission time, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Broadcast {
    /// Parse a wire text frame.
    pub fn from_wire(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Whether this broadcast is the service's error channel.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.event == ERROR_EVENT
    }

    /// Whether this broadcast is an unsolicited notification (not a reply
    /// to any invocation).
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.correlation_id.is_none() && !self.is_error()
    }
}
