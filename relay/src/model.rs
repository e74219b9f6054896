use serde::{Deserialize, Serialize};

/// One decoded notification payload from the sensor board.
///
/// The peripheral sends its IMU (accelerometer, gyroscope, magnetometer) and
/// environmental readings as a single JSON object per notification. Decode is
/// strict: a frame with missing, extra, or mistyped fields is rejected whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorReading {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
    pub mx: f32,
    pub my: f32,
    pub mz: f32,
    pub pressure: f32,
    pub temperature: f32,
    pub humidity: f32,
    #[serde(rename = "DeviceId")]
    pub device_id: String,
}

/// A reading plus its capture timestamp, ready for transport.
///
/// The timestamp is millisecond epoch, stamped at encode time. Readings are
/// never buffered between decode and encode, so the stamp reflects when the
/// envelope left the relay, not some earlier BLE event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    #[serde(rename = "nanoData")]
    pub nano_data: SensorReading,
    pub timestamp: i64,
}

/// A control message decoded from the command topic.
///
/// Anything outside the Start/Stop set decodes to `Other` and is applied as a
/// no-op, so an unrecognized command never fails the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Other(String),
}

/// Whether the peripheral is currently streaming sensor notifications.
/// Session-scoped, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
}
