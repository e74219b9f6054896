use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;

/// Drives the MQTT connection: publishes envelopes from the outbound channel
/// at most once, forwards control messages from the command topic to the
/// dispatcher, and maintains the shared connection flag that gates the relay.
///
/// Reconnection itself belongs to rumqttc; this task only tracks status and
/// re-subscribes after each ConnAck.
#[allow(clippy::too_many_arguments)]
pub async fn run_mqtt(
    broker: String,
    port: u16,
    client_id: String,
    publish_topic: String,
    command_topic: String,
    connected: Arc<AtomicBool>,
    commands: mpsc::Sender<Vec<u8>>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
) -> Result<()> {
    info!("Connecting to MQTT broker at {}:{}", broker, port);

    let mut mqtt_options = MqttOptions::new(client_id, broker, port);
    mqtt_options.set_keep_alive(Duration::from_secs(30));
    mqtt_options.set_clean_session(true);

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 64);

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    connected.store(true, Ordering::Relaxed);
                    info!("Connected, subscribing to {}", command_topic);
                    client.subscribe(&command_topic, QoS::AtMostOnce).await?;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(
                        "Control message on topic {}, size: {} bytes",
                        publish.topic,
                        publish.payload.len()
                    );
                    if commands.try_send(publish.payload.to_vec()).is_err() {
                        warn!("Command channel full, dropping control message");
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    connected.store(false, Ordering::Relaxed);
                    warn!("Broker disconnected the session");
                }
                Ok(_) => {}
                Err(e) => {
                    connected.store(false, Ordering::Relaxed);
                    error!("MQTT error: {}", e);
                    // rumqttc reconnects on the next poll, so we just back off
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            },
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    // At-most-once by contract: a failed publish is logged
                    // and the envelope is gone.
                    if let Err(e) = client
                        .publish(&publish_topic, QoS::AtMostOnce, false, payload)
                        .await
                    {
                        warn!("Publish failed: {}", e);
                    }
                }
                None => {
                    info!("Publish channel closed, stopping MQTT task");
                    return Ok(());
                }
            },
        }
    }
}
