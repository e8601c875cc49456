//! Transport Adapter boundary
//!
//! The platform Bluetooth stack as seen by the peripheral session. Control
//! operations may block on radio I/O and are async; `notify` sits on the
//! report hot path and must return immediately.

use crate::domain::error::TransportError;
use crate::domain::models::DeviceId;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Bluetooth Class of Device: Peripheral major class, Gamepad minor class.
pub const GAMEPAD_DEVICE_CLASS: u32 = 0x00_25_08;

/// GATT HID Service (HOGP).
pub const HID_SERVICE_UUID: u16 = 0x1812;

/// GAP Appearance: HID Gamepad.
pub const GAMEPAD_APPEARANCE: u16 = 0x03C4;

/// GATT characteristics the session writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacteristicId {
    /// HID Report (0x2A4D), Input report reference
    InputReport,
}

/// Asynchronous notifications from the platform stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "device", rename_all = "snake_case")]
pub enum TransportEvent {
    Connected(DeviceId),
    Bonded(DeviceId),
    Disconnected(DeviceId),
}

pub trait TransportAdapter: Send + Sync + 'static {
    fn set_alias(&self, alias: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn set_discoverable(&self, enabled: bool)
        -> impl Future<Output = Result<(), TransportError>> + Send;

    fn set_pairable(&self, enabled: bool) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn set_device_class(&self, class: u32)
        -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Register the HID service with `report_map` and start advertising it.
    fn advertise_service(
        &self,
        report_map: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn stop_advertising(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Drop the link to the current remote, if any.
    fn disconnect(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Push a characteristic notification without blocking.
    ///
    /// Returns [`TransportError::Busy`] when the value cannot be taken right
    /// now; the caller discards it.
    fn notify(&self, characteristic: CharacteristicId, value: &[u8]) -> Result<(), TransportError>;

    /// Reports accepted by `notify` but replaced before reaching the radio.
    fn superseded_reports(&self) -> u64 {
        0
    }
}
