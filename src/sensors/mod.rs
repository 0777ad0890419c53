//! Analog front-end sample handling: burst decoding, ECG smoothing, and
//! lead-contact debouncing.
//!
//! The decoder runs on the sampling worker; the debouncers are owned by the
//! session context and only ever see immutable [`SampleBatch`] values.

pub mod decoder;
pub mod lead_contact;
pub mod smoothing;

use heapless::Vec;

/// Fixed per-channel capacity of one burst read.
pub const BATCH_CAPACITY: usize = 32;

/// Committed electrode-contact state for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactState {
    On,
    #[default]
    Off,
}

impl ContactState {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl From<bool> for ContactState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// One decoded burst read.
///
/// Created once per hardware read; consumed immediately by the active
/// session (if any) and forwarded to the live plot.  A zero count means
/// "no new data", not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleBatch {
    /// Monotonic time of the burst read (milliseconds since boot).
    pub timestamp_ms: u64,
    /// Sign-extended (and optionally smoothed) ECG samples.
    pub ecg: Vec<i32, BATCH_CAPACITY>,
    /// Sign-extended BioZ samples.
    pub bioz: Vec<i32, BATCH_CAPACITY>,
    pub ecg_lead_off: bool,
    pub bioz_lead_off: bool,
    /// Most recent heart rate reported by the AFE (bpm).
    pub heart_rate: u16,
    /// Most recent R-to-R interval (ms).
    pub rr_interval_ms: u16,
    /// True when `rr_interval_ms` is a new beat since the previous burst.
    pub rr_updated: bool,
}

impl SampleBatch {
    pub fn ecg_count(&self) -> usize {
        self.ecg.len()
    }

    pub fn bioz_count(&self) -> usize {
        self.bioz.len()
    }

    /// Raw (pre-debounce) ECG electrode contact.
    pub fn ecg_contact(&self) -> bool {
        !self.ecg_lead_off
    }

    /// Raw (pre-debounce) BioZ electrode contact.
    pub fn bioz_contact(&self) -> bool {
        !self.bioz_lead_off
    }
}
