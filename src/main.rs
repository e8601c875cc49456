use anyhow::{Context, Result};
use deck_pad::application::{pump_reports, ControllerMode};
use deck_pad::domain::descriptor::DescriptorRegistry;
use deck_pad::domain::models::InputSnapshot;
use deck_pad::domain::session::PeripheralSession;
use deck_pad::domain::settings::{Settings, SettingsService, TransportKind};
use deck_pad::domain::transport::{TransportAdapter, TransportEvent};
use deck_pad::infrastructure::bluetooth::{BridgeTransport, SimulatedTransport};
use deck_pad::infrastructure::logging::init_logger;
use deck_pad::infrastructure::relay::RelayServer;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!(
        "Starting deck-pad (settings: {})",
        settings_service.path().display()
    );

    let descriptor = DescriptorRegistry::standard()
        .context("HID report descriptor does not match the input report layout")?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    match settings.transport.kind {
        TransportKind::Bridge => {
            let transport = BridgeTransport::connect(&settings.transport, events_tx)?;
            run(transport, events_rx, descriptor, &settings).await
        }
        TransportKind::Simulated => {
            warn!("Using simulated transport, no radio will be touched");
            let transport = SimulatedTransport::new(events_tx);
            run(transport, events_rx, descriptor, &settings).await
        }
    }
}

async fn run<T: TransportAdapter>(
    transport: T,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    descriptor: DescriptorRegistry,
    settings: &Settings,
) -> Result<()> {
    let session = Arc::new(
        PeripheralSession::new(Arc::new(transport), descriptor, settings.device_alias.clone())
            .with_device_class(settings.device_class),
    );
    tokio::spawn(session.clone().drive_events(events));

    let (input_tx, input_rx) = watch::channel(InputSnapshot::default());
    if settings.relay.enabled {
        let relay =
            RelayServer::bind(&settings.relay.bind_address, settings.relay.max_line_bytes).await?;
        tokio::spawn(relay.run(input_tx.clone()));
    } else {
        info!("Input relay disabled");
    }
    tokio::spawn(pump_reports(session.clone(), input_rx));

    let mode = ControllerMode::new(session);
    let response = mode.start().await;
    if !response.success {
        error!("{}", response.message);
        anyhow::bail!("{}", response.message);
    }
    info!("Pair with '{}' from the host's Bluetooth settings", settings.device_alias);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    let response = mode.stop().await;
    info!("{}", response.message);
    Ok(())
}
