//! Realtime coordination client for the Beacon suite.
//!
//! Maintains one live connection to the coordination service (WebSocket,
//! degrading to SSE or long polling), correlates invocations with their
//! result broadcasts, debounces chatty channels, replays in-flight requests
//! across reconnects, and routes unsolicited notifications to registered
//! consumers.
//!
//! ```no_run
//! use beacon_client::BeaconClient;
//! use beacon_settings::load_settings;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BeaconClient::new(load_settings()?);
//! client.connect().await?;
//!
//! let verdict = client.validate_email("ada@example.com").await?;
//! println!("valid: {}", verdict.is_valid);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

mod capabilities;
mod client;
mod connection;
mod correlator;
mod debounce;
mod router;
mod state;
mod transport;

pub use capabilities::{
    BillingCycle, CompanyNameAvailability, EmailValidation, PasswordStrength, PhoneValidation,
    PriceLineItem, PriceQuote, PriceRequest, TenantCodeAvailability, channels,
};
pub use client::BeaconClient;
pub use router::{Notification, NotificationRouter, Subscription};
pub use state::ConnectionState;

pub use beacon_core::envelope::Severity;
pub use beacon_core::errors::{ConnectError, InvokeError};
