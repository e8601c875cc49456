//! HOGP Peripheral Session
//!
//! Owns the lifecycle of one gamepad peripheral:
//!
//! ```text
//!   Idle ──start──▶ Advertising ──connected──▶ Connected ──bonded──▶ Bonded
//!    ▲                  ▲                          │                   │
//!    │                  └──────── disconnected ────┴───────────────────┘
//!    │
//!    └──── Disconnecting ◀──stop── (any state)
//! ```
//!
//! All transitions happen under one mutex holding [`SessionInner`]. Radio
//! I/O never runs under that mutex: `start`/`stop` serialize their adapter
//! calls on a separate async control lock, and a generation counter tells a
//! `start` whose adapter calls were overtaken by a `stop` that it lost.
//! `stop` moves to `Disconnecting` before awaiting anything, so transport
//! events that arrive afterwards can no longer reach `Bonded`.

use crate::domain::codec;
use crate::domain::descriptor::DescriptorRegistry;
use crate::domain::error::{SessionError, TransportError};
use crate::domain::models::{DeviceId, InputSnapshot, SendOutcome, SessionState, SessionStatus};
use crate::domain::transport::{
    CharacteristicId, TransportAdapter, TransportEvent, GAMEPAD_DEVICE_CLASS,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    /// Remote on the current link, bonded or not
    peer: Option<DeviceId>,
    bonded_device: Option<DeviceId>,
    last_report_sent_at: Option<SystemTime>,
    reports_sent: u64,
    reports_dropped: u64,
    /// Bumped by every accepted `start` and `stop`
    generation: u64,
    /// "Not connected" already logged since the last transition
    not_connected_logged: bool,
}

impl SessionInner {
    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!(from = %self.state, to = %next, "Session state change");
        }
        self.state = next;
        self.not_connected_logged = false;
        if next != SessionState::Bonded {
            self.bonded_device = None;
        }
        if matches!(next, SessionState::Idle | SessionState::Advertising) {
            self.peer = None;
        }
    }

    /// `superseded` counts reports the transport replaced before sending.
    fn status(&self, superseded: u64) -> SessionStatus {
        SessionStatus {
            active: self.state != SessionState::Idle,
            state: self.state,
            bonded_device_id: self.bonded_device.clone(),
            last_report_sent_at: self.last_report_sent_at,
            reports_sent: self.reports_sent,
            reports_dropped: self.reports_dropped + superseded,
        }
    }
}

pub struct PeripheralSession<T: TransportAdapter> {
    transport: Arc<T>,
    descriptor: DescriptorRegistry,
    alias: String,
    device_class: u32,
    inner: Mutex<SessionInner>,
    control: tokio::sync::Mutex<()>,
    status_tx: watch::Sender<SessionStatus>,
}

impl<T: TransportAdapter> PeripheralSession<T> {
    pub fn new(transport: Arc<T>, descriptor: DescriptorRegistry, alias: impl Into<String>) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::default());
        Self {
            transport,
            descriptor,
            alias: alias.into(),
            device_class: GAMEPAD_DEVICE_CLASS,
            inner: Mutex::new(SessionInner::default()),
            control: tokio::sync::Mutex::new(()),
            status_tx,
        }
    }

    /// Override the Class of Device set on start.
    pub fn with_device_class(mut self, class: u32) -> Self {
        self.device_class = class;
        self
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_inner().status(self.transport.superseded_reports())
    }

    pub fn state(&self) -> SessionState {
        self.lock_inner().state
    }

    /// Watch every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Enter `Advertising`: set identity, register the HID service, become
    /// pairable and discoverable. A no-op if the session is already active.
    pub async fn start(&self) -> Result<SessionStatus, SessionError> {
        let generation = {
            let mut inner = self.lock_inner();
            match inner.state {
                SessionState::Idle => {}
                SessionState::Disconnecting => {
                    return Err(SessionError::InvalidState {
                        state: inner.state,
                    })
                }
                state => {
                    debug!(%state, "start() ignored, session already active");
                    return Ok(inner.status(self.transport.superseded_reports()));
                }
            }
            inner.generation += 1;
            inner.transition(SessionState::Advertising);
            inner.generation
        };
        self.publish();

        let _control = self.control.lock().await;
        if !self.is_current(generation) {
            info!("start() overtaken by stop() before reaching the adapter");
            return Err(SessionError::Cancelled);
        }

        match self.bring_up().await {
            Ok(()) if self.is_current(generation) => {
                info!(alias = %self.alias, "Advertising as gamepad, waiting for host to pair");
                Ok(self.status())
            }
            Ok(()) => {
                info!("start() completed after stop(), teardown follows");
                Err(SessionError::Cancelled)
            }
            Err(e) => {
                warn!("Failed to start advertising: {}", e);
                {
                    let mut inner = self.lock_inner();
                    if inner.generation == generation {
                        inner.transition(SessionState::Idle);
                    }
                }
                self.publish();
                Err(e.into())
            }
        }
    }

    /// Drop the link, stop advertising and return to `Idle`. Idempotent.
    pub async fn stop(&self) -> Result<SessionStatus, SessionError> {
        let generation = {
            let mut inner = self.lock_inner();
            match inner.state {
                SessionState::Idle => {
                    debug!("stop() ignored, session idle");
                    return Ok(inner.status(self.transport.superseded_reports()));
                }
                SessionState::Disconnecting => None,
                _ => {
                    inner.generation += 1;
                    inner.transition(SessionState::Disconnecting);
                    Some(inner.generation)
                }
            }
        };

        let Some(generation) = generation else {
            // Another stop() owns the teardown; return once it is done.
            let _control = self.control.lock().await;
            return Ok(self.status());
        };
        self.publish();

        let _control = self.control.lock().await;
        self.tear_down().await;

        {
            let mut inner = self.lock_inner();
            if inner.generation == generation {
                inner.transition(SessionState::Idle);
            }
        }
        self.publish();
        info!("Controller session stopped");
        Ok(self.status())
    }

    /// Encode and notify one report. Only effective while `Bonded`.
    pub fn send_report(&self, snapshot: &InputSnapshot) -> SendOutcome {
        let report = codec::encode(snapshot);

        let mut inner = self.lock_inner();
        if inner.state != SessionState::Bonded {
            if !inner.not_connected_logged {
                inner.not_connected_logged = true;
                debug!(state = %inner.state, "Report not sent: not connected");
            }
            return SendOutcome::NotConnected;
        }

        match self
            .transport
            .notify(CharacteristicId::InputReport, report.as_bytes())
        {
            Ok(()) => {
                trace!("Input report: {:02X?}", report.as_bytes());
                inner.reports_sent += 1;
                inner.last_report_sent_at = Some(SystemTime::now());
                SendOutcome::Sent
            }
            Err(TransportError::Busy) => {
                trace!("Link busy, dropping stale report");
                inner.reports_dropped += 1;
                SendOutcome::Dropped
            }
            Err(e) => {
                debug!("Report notification failed: {}", e);
                inner.reports_dropped += 1;
                SendOutcome::Dropped
            }
        }
    }

    /// Apply one transport event.
    pub fn handle_event(&self, event: TransportEvent) {
        {
            let mut inner = self.lock_inner();
            match (inner.state, event) {
                (SessionState::Advertising, TransportEvent::Connected(device)) => {
                    info!(%device, "Host connected");
                    inner.peer = Some(device);
                    inner.transition(SessionState::Connected);
                }
                (SessionState::Connected, TransportEvent::Bonded(device))
                    if inner.peer.as_ref() == Some(&device) =>
                {
                    info!(%device, "Host bonded, sending reports");
                    inner.transition(SessionState::Bonded);
                    inner.bonded_device = Some(device);
                }
                (
                    SessionState::Connected | SessionState::Bonded,
                    TransportEvent::Disconnected(device),
                ) if inner.peer.as_ref() == Some(&device) => {
                    info!(%device, "Host disconnected, advertising again");
                    inner.transition(SessionState::Advertising);
                }
                (SessionState::Disconnecting, TransportEvent::Disconnected(device)) => {
                    debug!(%device, "Host disconnected during stop");
                    inner.transition(SessionState::Idle);
                }
                (state, event) => {
                    debug!(%state, ?event, "Ignoring transport event");
                    return;
                }
            }
        }
        self.publish();
    }

    /// Feed transport events into the session until the stream closes.
    pub async fn drive_events(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("Transport event stream closed");
    }

    async fn bring_up(&self) -> Result<(), TransportError> {
        self.transport.set_alias(&self.alias).await?;
        self.transport.set_device_class(self.device_class).await?;
        self.transport
            .advertise_service(self.descriptor.bytes())
            .await?;
        self.transport.set_pairable(true).await?;
        self.transport.set_discoverable(true).await?;
        Ok(())
    }

    async fn tear_down(&self) {
        if let Err(e) = self.transport.disconnect().await {
            warn!("Error disconnecting host: {}", e);
        }
        if let Err(e) = self.transport.stop_advertising().await {
            warn!("Error stopping advertisement: {}", e);
        }
        if let Err(e) = self.transport.set_discoverable(false).await {
            warn!("Error clearing discoverable: {}", e);
        }
        if let Err(e) = self.transport.set_pairable(false).await {
            warn!("Error clearing pairable: {}", e);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock_inner().generation == generation
    }

    fn publish(&self) {
        let status = self.status();
        self.status_tx.send_replace(status);
    }

    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
