//! Outbound session signals, status and application events.
//!
//! [`SessionSignal`] and [`StatusSnapshot`] go to the display layer over
//! latest-wins slots, one per signal kind.  [`AppEvent`] goes through the
//! [`EventSink`](super::ports::EventSink) port; adapters on the other side
//! decide what to do with it (serial log, companion-app telemetry, ...).

use crate::error::HwError;
use crate::fsm::{SessionMode, SessionOwner, SessionState};
use crate::sensors::ContactState;

/// Output of HRV post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HrvResult {
    pub interval_count: u16,
    pub mean_rr_ms: u16,
    /// Mean heart rate implied by `mean_rr_ms` (bpm).
    pub mean_heart_rate: u16,
}

/// One-shot completion / timeout notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    EcgComplete,
    HrvComplete(HrvResult),
    GsrComplete,
    /// No electrode contact within the lead timeout.
    LeadTimeout,
}

/// What the display shows for the foreground session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub owner: SessionOwner,
    pub state: SessionState,
    /// Seconds left in the current phase (or before the lead timeout).
    pub remaining_seconds: u16,
    /// Seconds of recorded (active-phase) time so far.
    pub elapsed_seconds: u16,
    pub heart_rate: u16,
    pub rr_interval_ms: u16,
    /// Committed contact on the foreground session's channel.
    pub contact: ContactState,
    /// Progress of a GSR session, foreground or not.
    pub gsr: Option<GsrProgress>,
}

/// GSR countdown as seen from the display, including while an ECG or HRV
/// session holds the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsrProgress {
    pub state: SessionState,
    pub contact: ContactState,
    pub remaining_seconds: u16,
    pub elapsed_seconds: u16,
}

/// Which of the two session machines an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPath {
    Ecg,
    Gsr,
}

/// Structured events emitted by the session service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started; both paths are Idle.
    Started,

    /// A session machine moved between states during one poll.
    StateChanged {
        path: SessionPath,
        from: SessionState,
        to: SessionState,
    },

    /// A start request conflicted with a running session.
    SessionRejected {
        requested: SessionMode,
        owner: SessionOwner,
    },

    /// A session was dropped because its hardware failed.
    SessionAborted { mode: SessionMode, error: HwError },

    /// A completion / timeout signal was published.
    Signal(SessionSignal),
}
