//! # beacon-core
//!
//! Foundation types for the Beacon realtime coordination client.
//!
//! This crate provides the shared vocabulary the client crates depend on:
//!
//! - **Branded IDs**: `CorrelationId`, `SubscriptionId` as newtypes for type safety
//! - **Wire envelopes**: `Invocation` and `Broadcast` JSON frames exchanged with
//!   the coordination service
//! - **Errors**: `ConnectError` / `InvokeError` hierarchy via `thiserror`
//! - **Backoff**: the fixed escalating reconnect delay schedule
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod backoff;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod transport;

pub use backoff::ReconnectSchedule;
pub use envelope::{Broadcast, Invocation, Severity};
pub use errors::{ConnectError, InvokeError};
pub use ids::{CorrelationId, SubscriptionId};
pub use transport::TransportKind;
