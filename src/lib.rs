//! Bluetooth HID gamepad peripheral.
//!
//! Turns a stream of logical controller snapshots into HID-over-GATT input
//! reports for a paired host.
//!
//! - [`domain`] - report codec, descriptor registry, peripheral session
//! - [`infrastructure`] - transport adapters, input relay, logging
//! - [`application`] - controller mode orchestration and report pump

pub mod application;
pub mod domain;
pub mod infrastructure;
