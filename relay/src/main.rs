mod ble;
mod command;
mod envelope;
mod errors;
mod frame;
mod metrics;
mod model;
mod mqtt;
mod relay;
mod session;

use axum::{routing::get, Router};
use std::env;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use session::CaptureSession;

#[tokio::main]
async fn main() {
    let mqtt_broker = env::var("MQTT_BROKER").unwrap_or_else(|_| "localhost".to_string());
    let mqtt_port: u16 = env::var("MQTT_PORT")
        .unwrap_or_else(|_| "1883".to_string())
        .parse()
        .unwrap_or(1883);
    let telemetry_topic = env::var("TELEMETRY_TOPIC").unwrap_or_else(|_| "blex".to_string());
    let command_topic = env::var("COMMAND_TOPIC").unwrap_or_else(|_| "blex/command".to_string());
    let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let ble_name = env::var("BLE_NAME").unwrap_or_else(|_| "nanosense".to_string());
    let channel_capacity: usize = env::var("CHANNEL_CAPACITY")
        .unwrap_or_else(|_| "256".to_string())
        .parse()
        .unwrap_or(256);

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting BLE telemetry relay");
    info!("MQTT broker: {}:{}", mqtt_broker, mqtt_port);
    info!(
        "Topics: telemetry={}, command={}",
        telemetry_topic, command_topic
    );
    info!("BLE peripheral name: {}", ble_name);

    // Initialize metrics
    metrics::init_metrics();

    // Connection flag maintained by the MQTT task, read by the relay to
    // gate publishing.
    let connected = Arc::new(AtomicBool::new(false));

    // Bounded channels between the components: decoded frames from the BLE
    // task, encoded envelopes to the MQTT task, raw control payloads to the
    // dispatcher, markers back to the BLE writer.
    info!("Channel capacity: {}", channel_capacity);
    let (frames_tx, frames_rx) = mpsc::channel(channel_capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(channel_capacity);
    let (commands_tx, commands_rx) = mpsc::channel(16);
    let (markers_tx, markers_rx) = mpsc::channel(8);

    let ble_handle = tokio::spawn(async move {
        if let Err(e) = ble::run_ble(ble_name, frames_tx, markers_rx).await {
            error!("BLE task failed: {}", e);
        }
    });

    let relay_connected = connected.clone();
    let relay_handle = tokio::spawn(async move {
        relay::run_relay(frames_rx, relay_connected, outbound_tx).await;
    });

    let dispatcher_handle = tokio::spawn(async move {
        session::run_dispatcher(commands_rx, CaptureSession::new(markers_tx)).await;
    });

    // Generate client ID
    let client_id = format!("relay-{}", uuid::Uuid::new_v4());
    let mqtt_connected = connected.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt::run_mqtt(
            mqtt_broker,
            mqtt_port,
            client_id,
            telemetry_topic,
            command_topic,
            mqtt_connected,
            commands_tx,
            outbound_rx,
        )
        .await
        {
            error!("MQTT task failed: {}", e);
        }
    });

    // Metrics endpoint
    let app = Router::new().route("/metrics", get(metrics_handler));

    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", http_addr, e);
            std::process::exit(1);
        });

    info!("Metrics server listening on {}", http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = ble_handle => {
            error!("BLE task terminated");
        }
        _ = relay_handle => {
            error!("Relay task terminated");
        }
        _ = dispatcher_handle => {
            error!("Dispatcher task terminated");
        }
        _ = mqtt_handle => {
            error!("MQTT task terminated");
        }
        _ = server_handle => {
            error!("Metrics server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
