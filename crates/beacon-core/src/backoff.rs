//! Reconnect delay schedule.
//!
//! The lifecycle manager retries a dropped connection on a fixed escalating
//! schedule: the first attempt is immediate, later attempts wait the
//! configured delays, and the schedule is finite — when it is exhausted the
//! connection transitions to `Closed`.

use serde::{Deserialize, Serialize};

/// Default reconnect delays in milliseconds: immediate, then escalating.
pub const DEFAULT_RECONNECT_DELAYS_MS: &[u64] = &[0, 2_000, 10_000, 30_000];

/// A finite, fixed reconnect schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReconnectSchedule {
    delays_ms: Vec<u64>,
}

impl Default for ReconnectSchedule {
    fn default() -> Self {
        Self {
            delays_ms: DEFAULT_RECONNECT_DELAYS_MS.to_vec(),
        }
    }
}

impl ReconnectSchedule {
    /// Build a schedule from explicit delays. An empty schedule disables
    /// automatic reconnection entirely.
    #[must_use]
    pub fn new(delays_ms: Vec<u64>) -> Self {
        Self { delays_ms }
    }

    /// Delay before the given zero-based attempt, or `None` once exhausted.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<u64> {
        self.delays_ms.get(attempt as usize).copied()
    }

    /// Total number of attempts the schedule allows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn max_attempts(&self) -> u32 {
        self.delays_ms.len() as u32
    }

    /// Whether the schedule allows any reconnection at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.delays_ms.is_empty()
    }
}
