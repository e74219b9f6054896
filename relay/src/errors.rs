use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport not connected")]
    TransportUnavailable,

    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("no Bluetooth adapter found")]
    NoAdapter,

    #[error("characteristic {0} not found on peripheral")]
    CharacteristicNotFound(Uuid),

    #[error("BLE {0} timed out")]
    BleTimeout(&'static str),

    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("channel send error")]
    ChannelSend,
}

pub type Result<T> = std::result::Result<T, Error>;
