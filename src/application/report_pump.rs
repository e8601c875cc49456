use crate::domain::models::{InputSnapshot, SendOutcome};
use crate::domain::session::PeripheralSession;
use crate::domain::transport::TransportAdapter;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Forward the newest snapshot to the session each time the source changes.
///
/// Snapshots published faster than they are forwarded collapse into the most
/// recent one. Returns when the source is dropped.
pub async fn pump_reports<T: TransportAdapter>(
    session: Arc<PeripheralSession<T>>,
    mut snapshots: watch::Receiver<InputSnapshot>,
) {
    while snapshots.changed().await.is_ok() {
        let snapshot = *snapshots.borrow_and_update();
        match session.send_report(&snapshot) {
            SendOutcome::Sent => {}
            outcome => trace!(?outcome, "Report not delivered"),
        }
    }
    debug!("Input source closed, report pump finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codec::encode;
    use crate::domain::descriptor::DescriptorRegistry;
    use crate::domain::models::{Button, DeviceId};
    use crate::domain::transport::TransportEvent;
    use crate::infrastructure::bluetooth::{AdapterCall, SimulatedTransport};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn forwards_latest_snapshot_once_bonded() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Arc::new(SimulatedTransport::new(tx));
        let session = Arc::new(PeripheralSession::new(
            transport.clone(),
            DescriptorRegistry::standard().unwrap(),
            "Pad",
        ));
        session.start().await.unwrap();
        session.handle_event(TransportEvent::Connected(DeviceId::new("host")));
        session.handle_event(TransportEvent::Bonded(DeviceId::new("host")));

        let (input_tx, input_rx) = watch::channel(InputSnapshot::default());
        let pump = tokio::spawn(pump_reports(session.clone(), input_rx));

        let pressed = InputSnapshot::default().with_button(Button::Y);
        input_tx.send_replace(pressed);
        tokio::task::yield_now().await;
        drop(input_tx);
        pump.await.unwrap();

        let notified: Vec<_> = transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                AdapterCall::Notify(_, bytes) => Some(bytes),
                _ => None,
            })
            .collect();
        assert_eq!(notified.last(), Some(&encode(&pressed).as_bytes().to_vec()));
    }

    #[tokio::test]
    async fn finishes_when_source_dropped_while_idle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Arc::new(SimulatedTransport::new(tx));
        let session = Arc::new(PeripheralSession::new(
            transport.clone(),
            DescriptorRegistry::standard().unwrap(),
            "Pad",
        ));
        let (input_tx, input_rx) = watch::channel(InputSnapshot::default());
        let pump = tokio::spawn(pump_reports(session, input_rx));

        input_tx.send_replace(InputSnapshot::default().with_button(Button::A));
        drop(input_tx);
        pump.await.unwrap();
        assert_eq!(transport.count(|c| matches!(c, AdapterCall::Notify(..))), 0);
    }
}
