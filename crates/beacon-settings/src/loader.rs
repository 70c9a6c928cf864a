//! Settings loading with file merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeaconSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Environment overrides are strict: integers must parse and fall within the
//! documented range; invalid values are logged and ignored rather than
//! aborting startup.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Json, Serialized};
use tracing::debug;

use beacon_core::backoff::ReconnectSchedule;

use crate::errors::Result;
use crate::types::BeaconSettings;

/// Resolve the path to the settings file (`~/.beacon/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BeaconSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    let mut figment = Figment::from(Serialized::defaults(BeaconSettings::default()));

    if path.exists() {
        debug!(?path, "loading settings from file");
        figment = figment.merge(Json::file(path));
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let mut settings: BeaconSettings = figment.extract()?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply environment variable overrides to loaded settings.
///
/// Each env var has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Invalid values are silently ignored (fall back to file/default)
pub fn apply_env_overrides(settings: &mut BeaconSettings) {
    // ── Connection settings ─────────────────────────────────────────
    if let Some(v) = read_env_string("BEACON_ENDPOINT_URL") {
        settings.connection.endpoint_url = v;
    }
    if let Some(v) = read_env_u64("BEACON_HANDSHAKE_TIMEOUT_MS", 100, 120_000) {
        settings.connection.handshake_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("BEACON_READY_WAIT_MS", 0, 60_000) {
        settings.connection.ready_wait_ms = v;
    }
    if let Some(v) = read_env_delays("BEACON_RECONNECT_DELAYS_MS") {
        settings.connection.reconnect_delays_ms = v;
    }

    // ── Channel settings ────────────────────────────────────────────
    if let Some(v) = read_env_u64("BEACON_DEBOUNCE_MS", 0, 10_000) {
        settings.channels.default_debounce_ms = v;
    }
    if let Some(v) = read_env_u64("BEACON_INVOKE_TIMEOUT_MS", 100, 600_000) {
        settings.channels.default_timeout_ms = v;
    }

    // ── Notification settings ───────────────────────────────────────
    if let Some(v) = read_env_usize("BEACON_HISTORY_LIMIT", 1, 1_000) {
        settings.notifications.history_limit = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a comma-separated list of millisecond delays, e.g. `"0,2000,10000"`.
pub fn parse_delays(val: &str) -> Option<ReconnectSchedule> {
    if val.trim().is_empty() {
        return Some(ReconnectSchedule::new(vec![]));
    }
    let delays: Option<Vec<u64>> = val
        .split(',')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect();
    delays.map(ReconnectSchedule::new)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

fn read_env_delays(name: &str) -> Option<ReconnectSchedule> {
    let val = std::env::var(name).ok()?;
    let result = parse_delays(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid delay list env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
