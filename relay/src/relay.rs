use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::envelope::encode_envelope;
use crate::errors::{Error, Result};
use crate::metrics::{ENVELOPES_PUBLISHED_TOTAL, FRAMES_DROPPED_DISCONNECTED_TOTAL};
use crate::model::SensorReading;

/// Encodes one reading and hands it to the publish channel, but only while
/// the transport is connected. Disconnected readings are dropped on the
/// floor: telemetry is best-effort and the relay keeps no local buffer.
pub fn handle_frame(
    reading: SensorReading,
    connected: &AtomicBool,
    outbound: &mpsc::Sender<Vec<u8>>,
) -> Result<()> {
    let payload = encode_envelope(reading)?;

    if !connected.load(Ordering::Relaxed) {
        return Err(Error::TransportUnavailable);
    }

    outbound.try_send(payload).map_err(|_| Error::ChannelSend)
}

/// Drains decoded readings from the capture side and forwards envelopes to
/// the transport. Every failure is swallowed here; nothing on this path
/// propagates to the caller.
pub async fn run_relay(
    mut frames: mpsc::Receiver<SensorReading>,
    connected: Arc<AtomicBool>,
    outbound: mpsc::Sender<Vec<u8>>,
) {
    info!("Starting telemetry relay");

    while let Some(reading) = frames.recv().await {
        match handle_frame(reading, &connected, &outbound) {
            Ok(()) => ENVELOPES_PUBLISHED_TOTAL.inc(),
            Err(Error::TransportUnavailable) => {
                FRAMES_DROPPED_DISCONNECTED_TOTAL.inc();
                debug!("Transport disconnected, dropping reading");
            }
            Err(e) => warn!("Dropping reading: {}", e),
        }
    }

    info!("Telemetry relay stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TelemetryEnvelope;
    use chrono::Utc;

    fn sample_reading() -> SensorReading {
        SensorReading {
            ax: 1.0,
            ay: 0.0,
            az: -1.0,
            gx: 0.1,
            gy: 0.2,
            gz: 0.3,
            mx: 10.0,
            my: 20.0,
            mz: 30.0,
            pressure: 100.9,
            temperature: 21.0,
            humidity: 45.0,
            device_id: "AA:BB".to_string(),
        }
    }

    #[test]
    fn test_publishes_while_connected() {
        let connected = AtomicBool::new(true);
        let (tx, mut rx) = mpsc::channel(4);

        let before = Utc::now().timestamp_millis();
        handle_frame(sample_reading(), &connected, &tx).unwrap();

        let payload = rx.try_recv().unwrap();
        let envelope: TelemetryEnvelope = serde_json::from_slice(&payload).unwrap();
        assert_eq!(envelope.nano_data.device_id, "AA:BB");
        assert!(envelope.timestamp >= before);
    }

    #[test]
    fn test_drops_silently_while_disconnected() {
        let connected = AtomicBool::new(false);
        let (tx, mut rx) = mpsc::channel(4);

        let result = handle_frame(sample_reading(), &connected, &tx);

        assert!(matches!(result, Err(Error::TransportUnavailable)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_relay_loop_never_propagates_errors() {
        tokio_test::block_on(async {
            let connected = Arc::new(AtomicBool::new(false));
            let (frames_tx, frames_rx) = mpsc::channel(4);
            let (outbound_tx, mut outbound_rx) = mpsc::channel(4);

            let handle = tokio::spawn(run_relay(frames_rx, connected.clone(), outbound_tx));

            // Disconnected: reading vanishes without killing the loop.
            frames_tx.send(sample_reading()).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;

            // Reconnect: the next reading goes through.
            connected.store(true, Ordering::Relaxed);
            frames_tx.send(sample_reading()).await.unwrap();

            let payload = outbound_rx.recv().await.unwrap();
            let envelope: TelemetryEnvelope = serde_json::from_slice(&payload).unwrap();
            assert_eq!(envelope.nano_data.device_id, "AA:BB");

            drop(frames_tx);
            handle.await.unwrap();
            assert!(outbound_rx.try_recv().is_err());
        });
    }
}
