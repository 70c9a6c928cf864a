//! Debounce gate: collapses bursts of calls on a channel.
//!
//! Each channel carries a strictly increasing generation counter. A call
//! registers (bumping the generation), sleeps for the channel's window, and
//! proceeds only if its generation is still current. Because registration is
//! atomic under the lock, two calls can never both be current — the race
//! where a call lands exactly as an earlier one fires resolves to the newer
//! call, always.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Per-channel generation counters.
#[derive(Default)]
pub(crate) struct DebounceGate {
    lanes: Mutex<HashMap<String, u64>>,
}

impl DebounceGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new call on the channel; returns its generation.
    pub(crate) fn register(&self, channel: &str) -> u64 {
        let mut lanes = self.lanes.lock();
        let generation = lanes.entry(channel.to_owned()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Whether the given generation is still the channel's newest call.
    pub(crate) fn is_current(&self, channel: &str, generation: u64) -> bool {
        self.lanes.lock().get(channel) == Some(&generation)
    }

    /// Cancel any pending debounce on the channel.
    pub(crate) fn reset(&self, channel: &str) {
        if let Some(generation) = self.lanes.lock().get_mut(channel) {
            *generation += 1;
        }
    }

    /// Cancel pending debounces on every channel (connection teardown).
    pub(crate) fn reset_all(&self) {
        for generation in self.lanes.lock().values_mut() {
            *generation += 1;
        }
    }
}
