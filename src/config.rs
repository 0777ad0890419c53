//! System configuration parameters
//!
//! All tunable parameters for the measurement-session core.
//! Values can be overridden from persisted settings (postcard blob) at boot.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Timing ---
    /// Session FSM poll interval (milliseconds)
    pub poll_interval_ms: u32,
    /// Sampling task wake period (milliseconds)
    pub sample_period_ms: u32,
    /// Minimum interval between status snapshots while a session runs
    pub status_interval_ms: u32,

    // --- Lead contact ---
    /// Continuous "on" readings required before contact is committed (ms)
    pub lead_on_debounce_ms: u32,
    /// Continuous "off" readings required before loss is committed (ms)
    pub lead_off_debounce_ms: u32,
    /// Give up waiting for electrode contact after this long (seconds)
    pub lead_timeout_secs: u16,

    // --- Session durations ---
    /// Signal settling window before recording starts (seconds)
    pub stabilization_secs: u16,
    /// Active recording window for a resting ECG (seconds)
    pub ecg_duration_secs: u16,
    /// Active recording window for an HRV evaluation (seconds)
    pub hrv_duration_secs: u16,
    /// Streaming window for a GSR recording (seconds)
    pub gsr_duration_secs: u16,

    // --- Buffers ---
    /// Maximum ECG samples held by one recording
    pub recording_capacity: usize,
    /// Maximum BioZ samples held by one GSR recording
    pub gsr_capacity: usize,
    /// Maximum R-to-R intervals held by one HRV recording
    pub interval_capacity: usize,

    // --- Signal conditioning ---
    /// Apply a moving average to ECG samples while decoding
    pub ecg_smoothing_enabled: bool,
    /// Moving-average window (samples)
    pub smoothing_window: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            poll_interval_ms: 100,   // 10 Hz session poll
            sample_period_ms: 125,   // 8 Hz burst reads
            status_interval_ms: 1000,

            // Lead contact
            lead_on_debounce_ms: 500,
            lead_off_debounce_ms: 500,
            lead_timeout_secs: 15,

            // Durations
            stabilization_secs: 5,
            ecg_duration_secs: 30,
            hrv_duration_secs: 60,
            gsr_duration_secs: 30,

            // Buffers: 60 s at 128 sps leaves headroom for HRV
            recording_capacity: 8192,
            gsr_capacity: 4096,
            interval_capacity: 256,

            // Signal conditioning
            ecg_smoothing_enabled: false,
            smoothing_window: 5,
        }
    }
}

impl SystemConfig {
    /// Largest moving-average window the decoder supports.
    pub const MAX_SMOOTHING_WINDOW: u8 = 8;

    /// Longest sampler period whose 128 sps of ECG still fits one burst.
    pub const MAX_SAMPLE_PERIOD_MS: u32 = 250;

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 || self.sample_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll/sample interval must be non-zero"));
        }
        if self.sample_period_ms > Self::MAX_SAMPLE_PERIOD_MS {
            return Err(ConfigError::ValidationFailed("sample_period_ms overflows one AFE burst"));
        }
        if self.lead_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("lead_timeout_secs must be non-zero"));
        }
        if self.ecg_duration_secs == 0 || self.hrv_duration_secs == 0 || self.gsr_duration_secs == 0
        {
            return Err(ConfigError::ValidationFailed("session durations must be non-zero"));
        }
        if self.smoothing_window == 0 || self.smoothing_window > Self::MAX_SMOOTHING_WINDOW {
            return Err(ConfigError::ValidationFailed("smoothing_window out of range 1..=8"));
        }
        if self.recording_capacity == 0 || self.gsr_capacity == 0 || self.interval_capacity == 0 {
            return Err(ConfigError::ValidationFailed("buffer capacities must be non-zero"));
        }
        Ok(())
    }

    /// Decode a persisted configuration blob and validate it.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Encode for persistence.
    pub fn to_postcard(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|_| ConfigError::Corrupted)
    }
}
