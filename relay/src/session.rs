use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::decode_command;
use crate::metrics::{COMMANDS_APPLIED_TOTAL, COMMANDS_IGNORED_TOTAL};
use crate::model::{CaptureState, ControlCommand};

/// Marker written to the peripheral to start streaming notifications.
pub const START_MARKER: &[u8] = b"Start";
/// Marker written to the peripheral to stop streaming notifications.
pub const STOP_MARKER: &[u8] = b"Stop";

/// Owns the capture state for one device connection and the marker channel
/// to the BLE writer task.
///
/// Commands are applied strictly in arrival order with no coalescing:
/// re-applying Start while already capturing re-sends the marker, which the
/// peripheral treats as idempotent.
pub struct CaptureSession {
    state: CaptureState,
    markers: mpsc::Sender<&'static [u8]>,
}

impl CaptureSession {
    pub fn new(markers: mpsc::Sender<&'static [u8]>) -> Self {
        Self {
            state: CaptureState::Idle,
            markers,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Applies one control command, whether it came from the command topic
    /// or a local trigger.
    pub fn dispatch(&mut self, command: ControlCommand) {
        let marker = match command {
            ControlCommand::Start => {
                self.state = CaptureState::Capturing;
                START_MARKER
            }
            ControlCommand::Stop => {
                self.state = CaptureState::Idle;
                STOP_MARKER
            }
            ControlCommand::Other(name) => {
                COMMANDS_IGNORED_TOTAL.inc();
                debug!("Ignoring unrecognized command {:?}", name);
                return;
            }
        };

        COMMANDS_APPLIED_TOTAL.inc();
        if let Err(e) = self.markers.try_send(marker) {
            warn!("Dropping marker write, BLE writer backlogged: {}", e);
        }
    }
}

/// Consumes raw control payloads from the transport and applies them to the
/// session. Malformed messages are dropped where they occur.
pub async fn run_dispatcher(mut commands: mpsc::Receiver<Vec<u8>>, mut session: CaptureSession) {
    info!("Starting command dispatcher");

    while let Some(payload) = commands.recv().await {
        match decode_command(&payload) {
            Ok(command) => session.dispatch(command),
            Err(e) => warn!("Dropping control message: {}", e),
        }
    }

    info!("Command dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_channel(capacity: usize) -> (CaptureSession, mpsc::Receiver<&'static [u8]>) {
        let (tx, rx) = mpsc::channel(capacity);
        (CaptureSession::new(tx), rx)
    }

    #[test]
    fn test_start_transitions_and_writes_once() {
        let (mut session, mut markers) = session_with_channel(4);
        assert_eq!(session.state(), CaptureState::Idle);

        session.dispatch(ControlCommand::Start);

        assert_eq!(session.state(), CaptureState::Capturing);
        assert_eq!(markers.try_recv().unwrap(), START_MARKER);
        assert!(markers.try_recv().is_err());
    }

    #[test]
    fn test_stop_transitions_and_writes_once() {
        let (mut session, mut markers) = session_with_channel(4);
        session.dispatch(ControlCommand::Start);
        markers.try_recv().unwrap();

        session.dispatch(ControlCommand::Stop);

        assert_eq!(session.state(), CaptureState::Idle);
        assert_eq!(markers.try_recv().unwrap(), STOP_MARKER);
        assert!(markers.try_recv().is_err());
    }

    #[test]
    fn test_unknown_command_is_a_no_op() {
        let (mut session, mut markers) = session_with_channel(4);

        session.dispatch(ControlCommand::Other("Reboot".to_string()));

        assert_eq!(session.state(), CaptureState::Idle);
        assert!(markers.try_recv().is_err());
    }

    #[test]
    fn test_repeated_start_resends_marker() {
        let (mut session, mut markers) = session_with_channel(4);

        session.dispatch(ControlCommand::Start);
        session.dispatch(ControlCommand::Start);

        assert_eq!(session.state(), CaptureState::Capturing);
        assert_eq!(markers.try_recv().unwrap(), START_MARKER);
        assert_eq!(markers.try_recv().unwrap(), START_MARKER);
    }

    #[test]
    fn test_dispatcher_drops_malformed_payloads() {
        tokio_test::block_on(async {
            let (commands_tx, commands_rx) = mpsc::channel(4);
            let (markers_tx, mut markers_rx) = mpsc::channel(4);

            let handle = tokio::spawn(run_dispatcher(
                commands_rx,
                CaptureSession::new(markers_tx),
            ));

            commands_tx.send(b"garbage".to_vec()).await.unwrap();
            commands_tx
                .send(br#"{"Command": "Start"}"#.to_vec())
                .await
                .unwrap();
            drop(commands_tx);
            handle.await.unwrap();

            assert_eq!(markers_rx.recv().await.unwrap(), START_MARKER);
            assert!(markers_rx.try_recv().is_err());
        });
    }
}
