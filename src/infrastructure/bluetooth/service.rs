//! Bridge Transport
//!
//! [`TransportAdapter`] backed by the platform bridge daemon. Control calls
//! become request/reply round trips; notifications go through the link's
//! single-slot outbox and never wait on the socket.

use crate::domain::error::TransportError;
use crate::domain::transport::{
    CharacteristicId, TransportAdapter, TransportEvent, GAMEPAD_APPEARANCE, HID_SERVICE_UUID,
};
use crate::domain::settings::TransportSettings;
use crate::infrastructure::bluetooth::connection::BridgeLink;
use crate::infrastructure::bluetooth::protocol::BridgeCommand;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct BridgeTransport {
    link: BridgeLink,
}

impl BridgeTransport {
    /// Connect to the bridge named in `settings`.
    pub fn connect(
        settings: &TransportSettings,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let link = BridgeLink::connect(
            &settings.socket_name,
            Duration::from_millis(settings.command_timeout_ms),
            events,
        )?;
        Ok(Self { link })
    }
}

impl TransportAdapter for BridgeTransport {
    async fn set_alias(&self, alias: &str) -> Result<(), TransportError> {
        self.link
            .request(BridgeCommand::SetAlias {
                alias: alias.to_string(),
            })
            .await
    }

    async fn set_discoverable(&self, enabled: bool) -> Result<(), TransportError> {
        self.link
            .request(BridgeCommand::SetDiscoverable { enabled })
            .await
    }

    async fn set_pairable(&self, enabled: bool) -> Result<(), TransportError> {
        self.link
            .request(BridgeCommand::SetPairable { enabled })
            .await
    }

    async fn set_device_class(&self, class: u32) -> Result<(), TransportError> {
        self.link
            .request(BridgeCommand::SetDeviceClass { class })
            .await
    }

    async fn advertise_service(&self, report_map: &[u8]) -> Result<(), TransportError> {
        self.link
            .request(BridgeCommand::AdvertiseService {
                service_uuid: HID_SERVICE_UUID,
                appearance: GAMEPAD_APPEARANCE,
                report_map: report_map.to_vec(),
            })
            .await
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        self.link.request(BridgeCommand::StopAdvertising).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.link.request(BridgeCommand::Disconnect).await
    }

    fn notify(&self, characteristic: CharacteristicId, value: &[u8]) -> Result<(), TransportError> {
        self.link.push_report(characteristic, value)
    }

    fn superseded_reports(&self) -> u64 {
        self.link.superseded_reports()
    }
}
