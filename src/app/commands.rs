//! Inbound commands to the session service.
//!
//! These represent actions requested by the outside world (buttons, UI,
//! companion app) that the [`SessionService`](super::service::SessionService)
//! arbitrates.  Cancel is not a command: it travels on its own
//! latest-wins signal so it can never be dropped behind a full queue.

use crate::fsm::SessionMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start a 30-second resting ECG capture.
    StartEcg,
    /// Start an HRV evaluation (ECG waveform plus R-to-R intervals).
    StartHrv,
    /// Start a GSR (stress) recording.
    StartGsr,
    /// The GSR consumer cannot take more data; finish the session now.
    GsrBufferFull,
}

impl SessionCommand {
    /// The session mode a start command asks for.
    pub fn requested_mode(self) -> Option<SessionMode> {
        match self {
            Self::StartEcg => Some(SessionMode::Ecg),
            Self::StartHrv => Some(SessionMode::Hrv),
            Self::StartGsr => Some(SessionMode::Gsr),
            Self::GsrBufferFull => None,
        }
    }
}
