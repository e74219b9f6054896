use serde::Deserialize;

use crate::errors::{Error, Result};
use crate::model::ControlCommand;

/// Wire shape of a control message: `{"Command": "<name>"}`.
#[derive(Debug, Deserialize)]
struct CommandMessage {
    #[serde(rename = "Command")]
    command: String,
}

/// Decodes an inbound control message into a command.
///
/// Only the message structure can fail here; an unrecognized command name
/// decodes to [`ControlCommand::Other`] so the dispatcher can apply it as an
/// explicit no-op.
pub fn decode_command(payload: &[u8]) -> Result<ControlCommand> {
    let message = serde_json::from_slice::<CommandMessage>(payload)
        .map_err(|e| Error::Decode(format!("control message: {}", e)))?;

    Ok(match message.command.as_str() {
        "Start" => ControlCommand::Start,
        "Stop" => ControlCommand::Stop,
        _ => ControlCommand::Other(message.command),
    })
}
