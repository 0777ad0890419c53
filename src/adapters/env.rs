//! Collaborator bundle handed to [`SessionService::poll`].
//!
//! The service needs settings, storage and HRV analysis in the same call;
//! bundling them behind one value avoids three separate `&mut` parameters.
//!
//! [`SessionService::poll`]: crate::app::service::SessionService::poll

use crate::app::events::HrvResult;
use crate::app::ports::{Hand, HrvAnalyzer, RecordingStore, SettingsPort, StorageError};
use crate::fsm::context::Recording;

pub struct SessionEnv<S, R, H> {
    pub settings: S,
    pub store: R,
    pub hrv: H,
}

impl<S, R, H> SessionEnv<S, R, H> {
    pub fn new(settings: S, store: R, hrv: H) -> Self {
        Self { settings, store, hrv }
    }
}

impl<S: SettingsPort, R, H> SettingsPort for SessionEnv<S, R, H> {
    fn lead_hand_orientation(&self) -> Hand {
        self.settings.lead_hand_orientation()
    }

    fn is_gsr_signal_recording_enabled(&self) -> bool {
        self.settings.is_gsr_signal_recording_enabled()
    }
}

impl<S, R: RecordingStore, H> RecordingStore for SessionEnv<S, R, H> {
    fn persist(&mut self, recording: &Recording) -> Result<(), StorageError> {
        self.store.persist(recording)
    }
}

impl<S, R, H: HrvAnalyzer> HrvAnalyzer for SessionEnv<S, R, H> {
    fn analyze(&mut self, rr_intervals_ms: &[u16]) -> HrvResult {
        self.hrv.analyze(rr_intervals_ms)
    }
}
