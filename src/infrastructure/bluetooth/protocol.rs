//! Platform Bridge Protocol
//!
//! Wire format spoken with the platform Bluetooth bridge daemon over a local
//! socket: one JSON object per line in each direction.
//!
//! ```text
//! deck-pad ──▶ bridge : BridgeCommand   {"cmd":"set_pairable","enabled":true}
//! deck-pad ◀── bridge : BridgeMessage   {"kind":"ack"}
//!                                       {"kind":"error","message":"..."}
//!                                       {"kind":"event","event":{"type":"bonded","device":"..."}}
//! ```
//!
//! Every command except `notify` gets exactly one `ack`/`error` reply, in
//! command order. Events may arrive interleaved with replies at any time.

use crate::domain::error::TransportError;
use crate::domain::transport::{CharacteristicId, TransportEvent};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default local socket name of the bridge daemon.
pub const DEFAULT_SOCKET_NAME: &str = "deck_pad_hogp.sock";

/// Default time to wait for a control command reply.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BridgeCommand {
    SetAlias {
        alias: String,
    },
    SetDiscoverable {
        enabled: bool,
    },
    SetPairable {
        enabled: bool,
    },
    SetDeviceClass {
        class: u32,
    },
    AdvertiseService {
        service_uuid: u16,
        appearance: u16,
        report_map: Vec<u8>,
    },
    StopAdvertising,
    Disconnect,
    Notify {
        characteristic: CharacteristicId,
        value: Vec<u8>,
    },
}

impl BridgeCommand {
    /// Whether the bridge answers this command with a reply line.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, BridgeCommand::Notify { .. })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeMessage {
    Ack,
    Error { message: String },
    Event { event: TransportEvent },
}

impl BridgeMessage {
    /// Reply payload for a control command, `None` for events.
    pub fn into_reply(self) -> Option<Result<(), TransportError>> {
        match self {
            BridgeMessage::Ack => Some(Ok(())),
            BridgeMessage::Error { message } => Some(Err(TransportError::Rejected(message))),
            BridgeMessage::Event { .. } => None,
        }
    }
}

/// Serialize one message as a newline-terminated line.
pub fn encode_line<M: Serialize>(message: &M) -> Result<String> {
    Ok(serde_json::to_string(message)? + "\n")
}

/// Parse one line received from the bridge.
pub fn parse_message(line: &str) -> Result<BridgeMessage> {
    let message = serde_json::from_str(line.trim_end())?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DeviceId;

    #[test]
    fn command_wire_format() {
        let line = encode_line(&BridgeCommand::SetPairable { enabled: true }).unwrap();
        assert_eq!(line, "{\"cmd\":\"set_pairable\",\"enabled\":true}\n");

        let line = encode_line(&BridgeCommand::Notify {
            characteristic: CharacteristicId::InputReport,
            value: vec![0x81, 0x00],
        })
        .unwrap();
        assert_eq!(
            line,
            "{\"cmd\":\"notify\",\"characteristic\":\"input_report\",\"value\":[129,0]}\n"
        );
    }

    #[test]
    fn parse_event_message() {
        let msg = parse_message(
            "{\"kind\":\"event\",\"event\":{\"type\":\"bonded\",\"device\":\"AA:BB\"}}\r\n",
        )
        .unwrap();
        assert_eq!(
            msg,
            BridgeMessage::Event {
                event: TransportEvent::Bonded(DeviceId::new("AA:BB"))
            }
        );
        assert_eq!(msg.into_reply(), None);
    }

    #[test]
    fn error_reply_maps_to_rejected() {
        let msg = parse_message("{\"kind\":\"error\",\"message\":\"not powered\"}").unwrap();
        assert_eq!(
            msg.into_reply(),
            Some(Err(TransportError::Rejected("not powered".to_string())))
        );
    }

    #[test]
    fn notify_expects_no_reply() {
        assert!(BridgeCommand::Disconnect.expects_reply());
        assert!(!BridgeCommand::Notify {
            characteristic: CharacteristicId::InputReport,
            value: vec![]
        }
        .expects_reply());
    }
}
