//! # beacon-settings
//!
//! Layered configuration for the Beacon coordination client.
//!
//! Settings load in three layers, later layers winning:
//!
//! 1. Compiled defaults ([`BeaconSettings::default`])
//! 2. A JSON settings file, deep-merged over the defaults via `figment`
//! 3. Environment variable overrides (`BEACON_*`), strictly validated

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::SettingsError;
pub use loader::{load_settings, load_settings_from_path};
pub use types::{
    BeaconSettings, ChannelOverride, ChannelSettings, ConnectionSettings, NotificationSettings,
};
