//! Unified error types for the VitalBand firmware.
//!
//! A single `Error` enum that every subsystem can convert into keeps the
//! top-level loop's error handling uniform.  All variants are `Copy` so
//! they can be passed through the inbox and the session FSM without
//! allocation.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The analog front-end rejected a command or a bus transaction failed.
    Hardware(HwError),
    /// A burst-read buffer could not be decoded.
    Decode(DecodeError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// A dedicated task could not be started.
    Task(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Task(msg) => write!(f, "task: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Failures reported by the AFE ports.  None of these are retried by the
/// session layer; a supervisor above it owns recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwError {
    /// SPI/I2C transaction failed.
    Bus,
    /// The device did not answer (unplugged, browned out, held in reset).
    NotResponding,
    /// The channel is not enabled, so there is nothing to read.
    NotReady,
}

impl fmt::Display for HwError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "bus transaction failed"),
            Self::NotResponding => write!(f, "device not responding"),
            Self::NotReady => write!(f, "channel not ready"),
        }
    }
}

impl From<HwError> for Error {
    fn from(e: HwError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Malformed burst-read input.  The offending batch is dropped; batches are
/// incremental so there is no session-level consequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Buffer shorter than the header, or shorter than the records it claims.
    Truncated { len: usize, needed: usize },
    /// A per-channel sample count above the fixed batch capacity.
    CountOverflow { claimed: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { len, needed } => {
                write!(f, "buffer truncated ({len} bytes, need {needed})")
            }
            Self::CountOverflow { claimed } => {
                write!(f, "sample count {claimed} exceeds batch capacity")
            }
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
