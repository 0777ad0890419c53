//! Port traits: the hexagonal boundary between the session core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SessionService / SamplerWorker (domain)
//! ```
//!
//! The analog front-end is split in two halves: the FSM thread owns
//! [`SensorControlPort`] (channel enable/disable), the sampling worker owns
//! [`SensorReadPort`] (burst reads and FIFO recovery).  No other code
//! touches the device.

use crate::config::SystemConfig;
use crate::error::HwError;
use crate::fsm::context::Recording;

use super::events::{AppEvent, HrvResult};

// ───────────────────────────────────────────────────────────────
// AFE control half (FSM thread)
// ───────────────────────────────────────────────────────────────

/// Channel power control.  Every operation is idempotent.
pub trait SensorControlPort {
    fn enable_ecg(&mut self) -> Result<(), HwError>;
    fn disable_ecg(&mut self) -> Result<(), HwError>;
    fn enable_bioz(&mut self) -> Result<(), HwError>;
    fn disable_bioz(&mut self) -> Result<(), HwError>;
}

// ───────────────────────────────────────────────────────────────
// AFE read half (sampling worker)
// ───────────────────────────────────────────────────────────────

pub trait SensorReadPort {
    /// Blocking burst read into `buf`.  Returns the number of bytes written.
    fn burst_read(&mut self, buf: &mut [u8]) -> Result<usize, HwError>;

    /// Flush the device FIFO after an overflow.
    fn reset_fifo(&mut self) -> Result<(), HwError>;

    /// Re-align the device sample clock after a FIFO reset.
    fn synchronize(&mut self) -> Result<(), HwError>;
}

// ───────────────────────────────────────────────────────────────
// User settings (read-only to the core)
// ───────────────────────────────────────────────────────────────

/// Wrist the device is worn on.  `Right` mirrors the ECG lead wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Hand {
    #[default]
    Left,
    Right,
}

pub trait SettingsPort {
    /// Read once per WaitForContact entry to latch ECG polarity.
    fn lead_hand_orientation(&self) -> Hand;

    /// Whether BioZ is kept streaming for the GSR signal recorder once an
    /// ECG / HRV session has ended.
    fn is_gsr_signal_recording_enabled(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Completed-recording handoff
// ───────────────────────────────────────────────────────────────

pub trait RecordingStore {
    /// Take ownership of the data in `recording` (copy or encode it).
    /// Called only for sessions that completed without cancellation.
    fn persist(&mut self, recording: &Recording) -> Result<(), StorageError>;
}

/// HRV post-processing hook.
pub trait HrvAnalyzer {
    fn analyze(&mut self, rr_intervals_ms: &[u16]) -> HrvResult;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Load configuration.  `Err(ConfigError::NotFound)` on first boot.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`RecordingStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage is full and the store does not evict.
    Full,
    /// The recording could not be encoded.
    Encode,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::Encode => write!(f, "recording encode failed"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
