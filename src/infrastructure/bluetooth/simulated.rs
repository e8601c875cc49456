//! In-process transport that records what the session asks of the radio.
//!
//! Used for dry runs (`transport.kind = "simulated"`) and by the tests: it can
//! hold control calls in flight, refuse notifications as busy, pretend the
//! stack is missing and inject remote-side events.

use crate::domain::error::TransportError;
use crate::domain::models::DeviceId;
use crate::domain::transport::{CharacteristicId, TransportAdapter, TransportEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    SetAlias(String),
    SetDiscoverable(bool),
    SetPairable(bool),
    SetDeviceClass(u32),
    AdvertiseService(Vec<u8>),
    StopAdvertising,
    Disconnect,
    Notify(CharacteristicId, Vec<u8>),
}

pub struct SimulatedTransport {
    calls: Mutex<Vec<AdapterCall>>,
    events: mpsc::UnboundedSender<TransportEvent>,
    paused: watch::Sender<bool>,
    busy: AtomicBool,
    unavailable: AtomicBool,
}

impl SimulatedTransport {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            calls: Mutex::new(Vec::new()),
            events,
            paused,
            busy: AtomicBool::new(false),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, pred: impl Fn(&AdapterCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| pred(c))
            .count()
    }

    /// Hold every control call until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    pub fn connect_host(&self, device: &str) {
        self.emit(TransportEvent::Connected(DeviceId::new(device)));
    }

    pub fn bond_host(&self, device: &str) {
        self.emit(TransportEvent::Bonded(DeviceId::new(device)));
    }

    pub fn drop_host(&self, device: &str) {
        self.emit(TransportEvent::Disconnected(DeviceId::new(device)));
    }

    fn record(&self, call: AdapterCall) {
        debug!(?call, "Simulated adapter call");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    async fn control(&self, call: AdapterCall) -> Result<(), TransportError> {
        let mut paused = self.paused.subscribe();
        // Sender lives in self, so the channel cannot close here.
        let _ = paused.wait_for(|p| !*p).await;

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(
                "no bluetooth adapter present".to_string(),
            ));
        }
        self.record(call);
        Ok(())
    }
}

impl TransportAdapter for SimulatedTransport {
    async fn set_alias(&self, alias: &str) -> Result<(), TransportError> {
        self.control(AdapterCall::SetAlias(alias.to_string())).await
    }

    async fn set_discoverable(&self, enabled: bool) -> Result<(), TransportError> {
        self.control(AdapterCall::SetDiscoverable(enabled)).await
    }

    async fn set_pairable(&self, enabled: bool) -> Result<(), TransportError> {
        self.control(AdapterCall::SetPairable(enabled)).await
    }

    async fn set_device_class(&self, class: u32) -> Result<(), TransportError> {
        self.control(AdapterCall::SetDeviceClass(class)).await
    }

    async fn advertise_service(&self, report_map: &[u8]) -> Result<(), TransportError> {
        self.control(AdapterCall::AdvertiseService(report_map.to_vec()))
            .await
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        self.control(AdapterCall::StopAdvertising).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.control(AdapterCall::Disconnect).await
    }

    fn notify(&self, characteristic: CharacteristicId, value: &[u8]) -> Result<(), TransportError> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(TransportError::Busy);
        }
        self.record(AdapterCall::Notify(characteristic, value.to_vec()));
        Ok(())
    }
}
