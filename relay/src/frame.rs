use crate::errors::{Error, Result};
use crate::model::SensorReading;

/// Decodes one BLE notification payload into a typed reading.
///
/// A payload that does not match the expected field set fails the decode and
/// the caller drops the frame. No retry, no partial record, no side effects.
pub fn decode_frame(payload: &[u8]) -> Result<SensorReading> {
    serde_json::from_slice::<SensorReading>(payload)
        .map_err(|e| Error::Decode(format!("sensor frame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> String {
        r#"{
            "ax": 0.01, "ay": -0.02, "az": 0.98,
            "gx": 1.5, "gy": -0.7, "gz": 0.0,
            "mx": 22.1, "my": -8.4, "mz": 40.2,
            "pressure": 101.2, "temperature": 24.5, "humidity": 38.0,
            "DeviceId": "AA:BB:CC:DD:EE:FF"
        }"#
        .to_string()
    }

    #[test]
    fn test_decode_well_formed_frame() {
        let reading = decode_frame(sample_frame().as_bytes()).unwrap();
        assert_eq!(reading.device_id, "AA:BB:CC:DD:EE:FF");
        assert!((reading.az - 0.98).abs() < f32::EPSILON);
        assert!((reading.temperature - 24.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decode_missing_field() {
        let frame = sample_frame().replace(r#""humidity": 38.0,"#, "");
        assert!(decode_frame(frame.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_wrong_type() {
        let frame = sample_frame().replace("24.5", r#""hot""#);
        assert!(decode_frame(frame.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_unknown_field() {
        let frame = sample_frame().replace(r#""ax":"#, r#""battery": 3.3, "ax":"#);
        assert!(decode_frame(frame.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_not_json() {
        assert!(decode_frame(b"\x00\x01\x02garbage").is_err());
        assert!(decode_frame(b"").is_err());
    }
}
