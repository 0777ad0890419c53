//! Fixed user settings.
//!
//! Stands in for the settings screen until the display firmware owns
//! persistence.  Values are plain fields so the binary and tests can set
//! them directly.

use serde::{Deserialize, Serialize};

use crate::app::ports::{Hand, SettingsPort};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedSettings {
    pub hand: Hand,
    pub gsr_signal_recording: bool,
}

impl SettingsPort for FixedSettings {
    fn lead_hand_orientation(&self) -> Hand {
        self.hand
    }

    fn is_gsr_signal_recording_enabled(&self) -> bool {
        self.gsr_signal_recording
    }
}
