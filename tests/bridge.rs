//! Bridge transport against an in-test bridge daemon on a local socket.

use deck_pad::domain::codec::encode;
use deck_pad::domain::descriptor::{DescriptorRegistry, GAMEPAD_REPORT_DESCRIPTOR};
use deck_pad::domain::error::{SessionError, TransportError};
use deck_pad::domain::models::{Button, DeviceId, InputSnapshot, SendOutcome, SessionState};
use deck_pad::domain::session::PeripheralSession;
use deck_pad::domain::settings::{TransportKind, TransportSettings};
use deck_pad::domain::transport::{
    CharacteristicId, TransportAdapter, TransportEvent, GAMEPAD_APPEARANCE, HID_SERVICE_UUID,
};
use deck_pad::infrastructure::bluetooth::protocol::{self, BridgeCommand, BridgeMessage};
use deck_pad::infrastructure::bluetooth::BridgeTransport;
use interprocess::local_socket::{
    traits::ListenerExt, GenericNamespaced, ListenerOptions, ToNsName,
};
use interprocess::TryClone;
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const HOST: &str = "11:22:33:44:55:66";

type Received = Arc<Mutex<Vec<BridgeCommand>>>;

/// Serve one client, answering each command with `respond`. `None` hangs up.
fn spawn_bridge(
    tag: &str,
    respond: fn(&BridgeCommand) -> Option<Vec<BridgeMessage>>,
) -> (TransportSettings, Received) {
    let socket_name = format!("deck_pad_test_{}_{}.sock", std::process::id(), tag);
    let listener = ListenerOptions::new()
        .name(socket_name.clone().to_ns_name::<GenericNamespaced>().unwrap())
        .create_sync()
        .unwrap();

    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();
    std::thread::spawn(move || {
        let Some(Ok(mut conn)) = listener.incoming().next() else {
            return;
        };
        let reader = BufReader::new(conn.try_clone().unwrap());
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let command: BridgeCommand = serde_json::from_str(&line).unwrap();
            let replies = respond(&command);
            log.lock().unwrap().push(command);
            let Some(replies) = replies else { return };
            for reply in replies {
                let out = protocol::encode_line(&reply).unwrap();
                if conn.write_all(out.as_bytes()).is_err() {
                    return;
                }
            }
        }
    });

    let settings = TransportSettings {
        kind: TransportKind::Bridge,
        socket_name,
        command_timeout_ms: 500,
    };
    (settings, received)
}

fn ack_and_pair(command: &BridgeCommand) -> Option<Vec<BridgeMessage>> {
    let replies = match command {
        BridgeCommand::Notify { .. } => vec![],
        BridgeCommand::SetDiscoverable { enabled: true } => vec![
            BridgeMessage::Ack,
            BridgeMessage::Event {
                event: TransportEvent::Connected(DeviceId::new(HOST)),
            },
            BridgeMessage::Event {
                event: TransportEvent::Bonded(DeviceId::new(HOST)),
            },
        ],
        _ => vec![BridgeMessage::Ack],
    };
    Some(replies)
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn session_pairs_and_notifies_through_bridge() {
    let (settings, received) = spawn_bridge("pair", ack_and_pair);
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = Arc::new(BridgeTransport::connect(&settings, tx).unwrap());
    let session = Arc::new(PeripheralSession::new(
        transport,
        DescriptorRegistry::standard().unwrap(),
        "Steam Deck Controller",
    ));
    tokio::spawn(session.clone().drive_events(rx));

    session.start().await.unwrap();
    wait_until(|| session.state() == SessionState::Bonded).await;

    let snapshot = InputSnapshot::default().with_button(Button::B);
    assert_eq!(session.send_report(&snapshot), SendOutcome::Sent);
    let expected = encode(&snapshot).as_bytes().to_vec();
    wait_until(|| {
        received
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, BridgeCommand::Notify { value, .. } if *value == expected))
    })
    .await;

    // Reports replaced in the bridge outbox count as dropped.
    for _ in 0..50 {
        assert_eq!(session.send_report(&snapshot), SendOutcome::Sent);
    }
    let superseded = session.transport().superseded_reports();
    assert_eq!(session.status().reports_dropped, superseded);
    assert_eq!(session.status().reports_sent, 51);

    session.stop().await.unwrap();
    assert_eq!(session.state(), SessionState::Idle);

    let commands = received.lock().unwrap().clone();
    assert_eq!(
        commands[..5].to_vec(),
        vec![
            BridgeCommand::SetAlias {
                alias: "Steam Deck Controller".to_string()
            },
            BridgeCommand::SetDeviceClass { class: 0x002508 },
            BridgeCommand::AdvertiseService {
                service_uuid: HID_SERVICE_UUID,
                appearance: GAMEPAD_APPEARANCE,
                report_map: GAMEPAD_REPORT_DESCRIPTOR.to_vec(),
            },
            BridgeCommand::SetPairable { enabled: true },
            BridgeCommand::SetDiscoverable { enabled: true },
        ]
    );
    assert_eq!(
        commands.last(),
        Some(&BridgeCommand::SetPairable { enabled: false })
    );
}

#[tokio::test]
async fn rejected_command_fails_start() {
    let (settings, _received) = spawn_bridge("reject", |command| match command {
        BridgeCommand::AdvertiseService { .. } => Some(vec![BridgeMessage::Error {
            message: "HID service already registered".to_string(),
        }]),
        _ => Some(vec![BridgeMessage::Ack]),
    });
    let (tx, _rx) = mpsc::unbounded_channel();
    let transport = Arc::new(BridgeTransport::connect(&settings, tx).unwrap());
    let session = PeripheralSession::new(
        transport,
        DescriptorRegistry::standard().unwrap(),
        "Pad",
    );

    let err = session.start().await.unwrap_err();
    match err {
        SessionError::AdapterUnavailable(message) => {
            assert!(message.contains("HID service already registered"))
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn silent_bridge_times_out() {
    let (settings, _received) = spawn_bridge("silent", |_| Some(vec![]));
    let (tx, _rx) = mpsc::unbounded_channel();
    let transport = BridgeTransport::connect(&settings, tx).unwrap();

    assert_eq!(
        transport.set_pairable(true).await,
        Err(TransportError::Timeout)
    );
}

#[tokio::test]
async fn closed_bridge_is_unavailable() {
    let (settings, _received) = spawn_bridge("closed", |_| None);
    let (tx, _rx) = mpsc::unbounded_channel();
    let transport = BridgeTransport::connect(&settings, tx).unwrap();

    assert!(matches!(
        transport.disconnect().await,
        Err(TransportError::Unavailable(_))
    ));
    assert!(matches!(
        transport.notify(CharacteristicId::InputReport, &[0u8; 20]),
        Err(TransportError::Unavailable(_))
    ));
}

#[test]
fn missing_bridge_fails_to_connect() {
    let settings = TransportSettings {
        kind: TransportKind::Bridge,
        socket_name: format!("deck_pad_test_{}_absent.sock", std::process::id()),
        command_timeout_ms: 100,
    };
    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(BridgeTransport::connect(&settings, tx).is_err());
}
