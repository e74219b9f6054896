use serde::{Deserialize, Serialize};

/// Control message consumed by the relay: `{"Command": "Start"|"Stop"}`.
#[derive(Debug, Serialize)]
pub struct CommandMessage {
    #[serde(rename = "Command")]
    pub command: String,
}

#[derive(Debug, Clone, Deserialize)]
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

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryEnvelope {
    #[serde(rename = "nanoData")]
    pub nano_data: SensorReading,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_shape() {
        let payload = serde_json::to_string(&CommandMessage {
            command: "Start".to_string(),
        })
        .unwrap();
        assert_eq!(payload, r#"{"Command":"Start"}"#);
    }

    #[test]
    fn test_envelope_decodes_relay_output() {
        let payload = r#"{
            "nanoData": {
                "ax": 0.0, "ay": 0.0, "az": 1.0,
                "gx": 0.0, "gy": 0.0, "gz": 0.0,
                "mx": 0.0, "my": 0.0, "mz": 0.0,
                "pressure": 101.0, "temperature": 22.0, "humidity": 40.0,
                "DeviceId": "AA:BB"
            },
            "timestamp": 1724457600000
        }"#;

        let envelope: TelemetryEnvelope = serde_json::from_str(payload).unwrap();
        assert_eq!(envelope.nano_data.device_id, "AA:BB");
        assert_eq!(envelope.timestamp, 1724457600000);
    }
}
