use std::collections::BTreeSet;
use std::time::Duration;

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::frame::decode_frame;
use crate::metrics::{
    CHANNEL_FULL_TOTAL, FRAMES_TOTAL, FRAME_DECODE_FAILURES_TOTAL, MARKER_WRITES_TOTAL,
};
use crate::model::SensorReading;

/// GATT layout of the nanosense peripheral firmware.
pub const SENSOR_SERVICE: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);
/// Capture markers are written here (peripheral RX).
pub const WRITE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00001142_0000_1000_8000_00805f9b34fb);
/// Sensor frames arrive here (peripheral TX).
pub const NOTIFY_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00001143_0000_1000_8000_00805f9b34fb);

const SCAN_WINDOW_SECS: u64 = 5;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const DISCOVERY_TIMEOUT_SECS: u64 = 15;

enum SessionEnd {
    /// The marker channel closed: the rest of the relay is gone.
    Shutdown,
    /// The BLE link dropped; the caller rescans.
    Disconnected,
}

/// Owns the BLE side of the relay: finds the sensor peripheral, subscribes
/// to its notify characteristic, forwards decoded frames to the relay
/// channel, and writes capture markers coming back from the dispatcher.
///
/// Reconnects by rescanning whenever the link drops.
pub async fn run_ble(
    name_prefix: String,
    frames: mpsc::Sender<SensorReading>,
    mut markers: mpsc::Receiver<&'static [u8]>,
) -> Result<()> {
    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(Error::NoAdapter)?;

    loop {
        let peripheral = find_peripheral(&adapter, &name_prefix).await?;
        match stream_peripheral(&adapter, &peripheral, &frames, &mut markers).await {
            Ok(SessionEnd::Shutdown) => return Ok(()),
            Ok(SessionEnd::Disconnected) => {
                warn!("Peripheral disconnected, rescanning for {}", name_prefix);
            }
            Err(e) => {
                warn!("BLE session error: {}, rescanning for {}", e, name_prefix);
            }
        }
    }
}

/// Scans in fixed windows until a peripheral advertising the expected name
/// shows up.
async fn find_peripheral(adapter: &Adapter, name_prefix: &str) -> Result<Peripheral> {
    info!("Scanning for BLE peripheral {}...", name_prefix);

    loop {
        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(Duration::from_secs(SCAN_WINDOW_SECS)).await;

        for peripheral in adapter.peripherals().await? {
            if let Ok(Some(props)) = peripheral.properties().await {
                let name = props.local_name.unwrap_or_default();
                if name.starts_with(name_prefix) {
                    adapter.stop_scan().await.ok();
                    info!("Found {} at {}", name, peripheral.address());
                    return Ok(peripheral);
                }
            }
        }

        adapter.stop_scan().await.ok();
        debug!("No matching peripheral in this scan window, retrying");
    }
}

fn find_characteristic(
    characteristics: &BTreeSet<Characteristic>,
    uuid: Uuid,
) -> Result<Characteristic> {
    characteristics
        .iter()
        .find(|c| c.uuid == uuid)
        .cloned()
        .ok_or(Error::CharacteristicNotFound(uuid))
}

async fn stream_peripheral(
    adapter: &Adapter,
    peripheral: &Peripheral,
    frames: &mpsc::Sender<SensorReading>,
    markers: &mut mpsc::Receiver<&'static [u8]>,
) -> Result<SessionEnd> {
    // connect() can block indefinitely when the device went out of range
    // between discovery and now, so it gets a hard timeout.
    tokio::time::timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), peripheral.connect())
        .await
        .map_err(|_| Error::BleTimeout("connect"))??;

    // BlueZ signals the connection before the remote GATT cache is
    // populated; discovering too early yields an empty characteristic set.
    #[cfg(target_os = "linux")]
    tokio::time::sleep(Duration::from_millis(600)).await;

    tokio::time::timeout(
        Duration::from_secs(DISCOVERY_TIMEOUT_SECS),
        peripheral.discover_services(),
    )
    .await
    .map_err(|_| Error::BleTimeout("service discovery"))??;

    if !peripheral.services().iter().any(|s| s.uuid == SENSOR_SERVICE) {
        warn!("Peripheral does not advertise the sensor service {}", SENSOR_SERVICE);
    }

    let characteristics = peripheral.characteristics();
    let write_char = find_characteristic(&characteristics, WRITE_CHARACTERISTIC)?;
    let notify_char = find_characteristic(&characteristics, NOTIFY_CHARACTERISTIC)?;

    peripheral.subscribe(&notify_char).await?;
    info!("Connected and subscribed to sensor notifications");

    let peripheral_id = peripheral.id();
    let mut notifications = peripheral.notifications().await?;
    let mut events = adapter.events().await?;

    loop {
        tokio::select! {
            notification = notifications.next() => {
                let Some(notification) = notification else {
                    return Ok(SessionEnd::Disconnected);
                };
                if notification.uuid != NOTIFY_CHARACTERISTIC {
                    continue;
                }

                FRAMES_TOTAL.inc();
                match decode_frame(&notification.value) {
                    Ok(reading) => match frames.try_send(reading) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            CHANNEL_FULL_TOTAL.inc();
                            warn!("Frame channel full, dropping reading");
                        }
                        Err(TrySendError::Closed(_)) => {
                            return Ok(SessionEnd::Shutdown);
                        }
                    },
                    Err(e) => {
                        FRAME_DECODE_FAILURES_TOTAL.inc();
                        warn!("Dropping frame: {}", e);
                    }
                }
            }
            marker = markers.recv() => {
                let Some(marker) = marker else {
                    peripheral.disconnect().await.ok();
                    return Ok(SessionEnd::Shutdown);
                };
                match peripheral
                    .write(&write_char, marker, WriteType::WithoutResponse)
                    .await
                {
                    Ok(()) => MARKER_WRITES_TOTAL.inc(),
                    Err(e) => warn!("Marker write failed: {}", e),
                }
            }
            event = events.next() => {
                if let Some(CentralEvent::DeviceDisconnected(id)) = event {
                    if id == peripheral_id {
                        return Ok(SessionEnd::Disconnected);
                    }
                }
            }
        }
    }
}
