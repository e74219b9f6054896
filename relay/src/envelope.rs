use chrono::Utc;

use crate::errors::Result;
use crate::model::{SensorReading, TelemetryEnvelope};

/// Wraps a decoded reading in a transport envelope and serializes it.
///
/// The wall clock is read here, at encode time. A serialization failure is a
/// logic error for well-formed input; the caller logs and drops it.
pub fn encode_envelope(reading: SensorReading) -> Result<Vec<u8>> {
    let envelope = TelemetryEnvelope {
        nano_data: reading,
        timestamp: Utc::now().timestamp_millis(),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_reading() -> SensorReading {
        SensorReading {
            ax: 1.0,
            ay: 2.0,
            az: 3.0,
            gx: 4.0,
            gy: 5.0,
            gz: 6.0,
            mx: 7.0,
            my: 8.0,
            mz: 9.0,
            pressure: 101.2,
            temperature: 24.5,
            humidity: 38.0,
            device_id: "AA:BB".to_string(),
        }
    }

    #[test]
    fn test_envelope_preserves_reading_and_stamps_at_encode_time() {
        let before = Utc::now().timestamp_millis();
        let payload = encode_envelope(sample_reading()).unwrap();
        let after = Utc::now().timestamp_millis();

        let envelope: TelemetryEnvelope = serde_json::from_slice(&payload).unwrap();
        assert_eq!(envelope.nano_data, sample_reading());
        assert!(envelope.timestamp >= before);
        assert!(envelope.timestamp <= after);
    }

    #[test]
    fn test_envelope_wire_shape() {
        let payload = encode_envelope(sample_reading()).unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();

        let nano_data = value.get("nanoData").expect("nanoData key");
        assert_eq!(nano_data.get("DeviceId").unwrap(), "AA:BB");
        assert_eq!(nano_data.get("ax").unwrap().as_f64().unwrap(), 1.0);
        assert!(value.get("timestamp").unwrap().is_i64());
    }
}
