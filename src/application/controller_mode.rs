use crate::domain::error::SessionError;
use crate::domain::models::{CommandResponse, SessionState, SessionStatus};
use crate::domain::session::PeripheralSession;
use crate::domain::transport::TransportAdapter;
use std::sync::Arc;
use tracing::{error, info};

/// Start/stop/status surface handed to the plugin layer.
pub struct ControllerMode<T: TransportAdapter> {
    session: Arc<PeripheralSession<T>>,
}

impl<T: TransportAdapter> Clone for ControllerMode<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<T: TransportAdapter> ControllerMode<T> {
    pub fn new(session: Arc<PeripheralSession<T>>) -> Self {
        Self { session }
    }

    pub async fn start(&self) -> CommandResponse {
        let was_active = self.session.state() != SessionState::Idle;
        match self.session.start().await {
            Ok(_) if was_active => CommandResponse::ok("Controller mode already active"),
            Ok(_) => {
                info!("Controller mode active");
                CommandResponse::ok("Controller mode started")
            }
            Err(e @ SessionError::AdapterUnavailable(_)) => {
                error!("Failed to start controller mode: {}", e);
                CommandResponse::failed(format!("Failed to start: {}", e))
            }
            Err(e) => CommandResponse::failed(e.to_string()),
        }
    }

    pub async fn stop(&self) -> CommandResponse {
        match self.session.stop().await {
            Ok(_) => CommandResponse::ok("Controller mode stopped"),
            Err(e) => CommandResponse::failed(e.to_string()),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::descriptor::DescriptorRegistry;
    use crate::infrastructure::bluetooth::SimulatedTransport;
    use tokio::sync::mpsc;

    fn mode() -> (ControllerMode<SimulatedTransport>, Arc<SimulatedTransport>) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = Arc::new(SimulatedTransport::new(tx));
        let session = PeripheralSession::new(
            transport.clone(),
            DescriptorRegistry::standard().unwrap(),
            "Test Pad",
        );
        (ControllerMode::new(Arc::new(session)), transport)
    }

    #[tokio::test]
    async fn start_stop_messages() {
        let (mode, _) = mode();
        assert_eq!(mode.start().await, CommandResponse::ok("Controller mode started"));
        assert_eq!(
            mode.start().await,
            CommandResponse::ok("Controller mode already active")
        );
        assert!(mode.status().active);
        assert_eq!(mode.stop().await, CommandResponse::ok("Controller mode stopped"));
        assert!(!mode.status().active);
    }

    #[tokio::test]
    async fn missing_adapter_fails_start() {
        let (mode, transport) = mode();
        transport.set_unavailable(true);
        let response = mode.start().await;
        assert!(!response.success);
        assert!(response.message.starts_with("Failed to start"));
        assert_eq!(mode.status().state, SessionState::Idle);
    }

    #[test]
    fn response_serializes_like_plugin_reply() {
        let json = serde_json::to_string(&CommandResponse::ok("Controller mode stopped")).unwrap();
        assert_eq!(json, r#"{"success":true,"message":"Controller mode stopped"}"#);
    }
}
