//! Bluetooth Module
//!
//! Transport adapters for the HOGP peripheral session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   PeripheralSession                      │
//! │        (state machine, talks to TransportAdapter)        │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!          ┌────────────┴─────────────┐
//!          │                          │
//!          ▼                          ▼
//! ┌─────────────────┐        ┌──────────────────┐
//! │ BridgeTransport │        │SimulatedTransport│
//! │                 │        │                  │
//! │ - local socket  │        │ - records calls  │
//! │ - JSON lines    │        │ - injects events │
//! └─────────────────┘        └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Bridge wire messages and framing
//! - [`connection`] - Local socket link with reader/writer threads
//! - [`service`] - Bridge-backed transport adapter
//! - [`simulated`] - In-process adapter for dry runs and tests

pub mod connection;
pub mod protocol;
pub mod service;
pub mod simulated;

pub use service::BridgeTransport;
pub use simulated::{AdapterCall, SimulatedTransport};
