mod messages;

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use rand::Rng;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tracing::{error, info, warn};

use messages::{CommandMessage, TelemetryEnvelope};

/// Operator console for the BLE telemetry relay.
#[derive(Parser)]
#[command(name = "commander")]
struct Cli {
    #[arg(long, env = "MQTT_BROKER", default_value = "localhost")]
    broker: String,

    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    port: u16,

    #[arg(long, env = "TELEMETRY_TOPIC", default_value = "blex")]
    telemetry_topic: String,

    #[arg(long, env = "COMMAND_TOPIC", default_value = "blex/command")]
    command_topic: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Tell the relay to start capturing sensor data
    Start,
    /// Tell the relay to stop capturing sensor data
    Stop,
    /// Subscribe to the telemetry topic and print incoming envelopes
    Watch,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Generate client ID
    let mut rng = rand::thread_rng();
    let client_id = format!("commander-{}", rng.gen::<u32>());

    let mut mqtt_options = MqttOptions::new(&client_id, &cli.broker, cli.port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    let (client, eventloop) = AsyncClient::new(mqtt_options, 16);

    match cli.action {
        Action::Start => send_command(client, eventloop, &cli.command_topic, "Start").await,
        Action::Stop => send_command(client, eventloop, &cli.command_topic, "Stop").await,
        Action::Watch => watch(client, eventloop, &cli.telemetry_topic).await,
    }
}

async fn send_command(client: AsyncClient, mut eventloop: EventLoop, topic: &str, name: &str) {
    let payload = match serde_json::to_vec(&CommandMessage {
        command: name.to_string(),
    }) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to serialize command: {}", e);
            return;
        }
    };

    if let Err(e) = client.publish(topic, QoS::AtLeastOnce, false, payload).await {
        error!("Failed to publish: {}", e);
        return;
    }

    // Drive the eventloop until the broker acknowledges the publish.
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::PubAck(_))) => {
                info!("Sent {} to {}", name, topic);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT error: {}", e);
                return;
            }
        }
    }
}

async fn watch(client: AsyncClient, mut eventloop: EventLoop, topic: &str) {
    if let Err(e) = client.subscribe(topic, QoS::AtMostOnce).await {
        error!("Failed to subscribe to {}: {}", topic, e);
        return;
    }

    info!("Watching {} (ctrl-c to quit)", topic);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match serde_json::from_slice::<TelemetryEnvelope>(&publish.payload) {
                    Ok(envelope) => print_envelope(&envelope),
                    Err(_) => warn!(
                        "Non-envelope payload on {}: {} bytes",
                        publish.topic,
                        publish.payload.len()
                    ),
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn print_envelope(envelope: &TelemetryEnvelope) {
    let captured = Utc
        .timestamp_millis_opt(envelope.timestamp)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| envelope.timestamp.to_string());

    let reading = &envelope.nano_data;
    info!(
        "{} [{}] accel=({:.2},{:.2},{:.2}) gyro=({:.1},{:.1},{:.1}) mag=({:.1},{:.1},{:.1}) {:.1}kPa {:.1}C {:.1}%",
        reading.device_id,
        captured,
        reading.ax,
        reading.ay,
        reading.az,
        reading.gx,
        reading.gy,
        reading.gz,
        reading.mx,
        reading.my,
        reading.mz,
        reading.pressure,
        reading.temperature,
        reading.humidity,
    );
}
