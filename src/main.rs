//! airlink2mqtt - Main entry point
//!
//! Parses the CLI, merges the YAML config file, sets up logging, binds the
//! AirLink UDP session and runs the bridge until SIGINT or SIGTERM.

use airlink2mqtt::bridge::MessageBridge;
use airlink2mqtt::broker::MqttBroker;
use airlink2mqtt::config::{Cli, Settings};
use airlink2mqtt::device::UdpDeviceSession;
use airlink2mqtt::observability::init_logging;
use airlink2mqtt::protocol::BridgeTopics;
use clap::Parser;
use std::process;
use tokio::signal;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(2);
        }
    };

    if let Err(e) = run(settings).await {
        error!("Fatal error: {e}");
        process::exit(1);
    }

    info!("Shutdown complete");
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting airlink2mqtt v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        host = %settings.mqtt.host,
        port = settings.mqtt.port,
        topic_prefix = %settings.mqtt.topic_prefix,
        "MQTT broker settings"
    );
    debug!(
        host = %settings.device.host,
        port = settings.device.port,
        listen_port = settings.device.listen_port,
        bind_addr = %settings.device.bind_addr,
        "AirLink modem settings"
    );

    let device = UdpDeviceSession::bind(&settings.device).await?;
    info!(
        listen_port = settings.device.listen_port,
        "Started AirLink SMS listener"
    );

    let topics = BridgeTopics::new(&settings.mqtt.topic_prefix);
    let reconnect_delay = settings.mqtt.reconnect_delay;
    let bridge = MessageBridge::new(MqttBroker::new(settings.mqtt), topics, reconnect_delay);

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        () = bridge.run(&device) => {}
        _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }

    Ok(())
}
