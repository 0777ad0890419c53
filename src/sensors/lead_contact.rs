//! Lead-contact debouncer.
//!
//! Converts the per-burst raw contact flag into committed
//! [`ContactState`] transitions.  A candidate transition is armed on the
//! first reading that disagrees with the committed state and confirmed
//! only once the disagreement has held for the full window:
//!
//! ```text
//!  Stable ── raw != committed ──▶ Pending { since_ms }
//!    ▲                              │          │
//!    ├──── raw == committed ────────┘          │ now - since >= window
//!    │                                         ▼
//!    └─────────────────────────────── commit + emit edge
//! ```
//!
//! On and off use separate windows.  Committed state starts `Off`.

use super::ContactState;

/// A committed contact edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactTransition {
    ToOn,
    ToOff,
}

/// Candidate transition being confirmed.  Exists only while armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DebounceTimer {
    since_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LeadDebouncer {
    on_window_ms: u64,
    off_window_ms: u64,
    committed: ContactState,
    pending: Option<DebounceTimer>,
}

impl LeadDebouncer {
    pub fn new(on_window_ms: u32, off_window_ms: u32) -> Self {
        Self {
            on_window_ms: u64::from(on_window_ms),
            off_window_ms: u64::from(off_window_ms),
            committed: ContactState::Off,
            pending: None,
        }
    }

    pub fn committed(&self) -> ContactState {
        self.committed
    }

    /// True while a candidate transition is being confirmed.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Back to committed `Off` with no candidate armed.
    pub fn reset(&mut self) {
        self.committed = ContactState::Off;
        self.pending = None;
    }

    /// Feed one raw reading taken at `now_ms`.
    pub fn observe(&mut self, raw_contact: bool, now_ms: u64) -> Option<ContactTransition> {
        let raw = ContactState::from(raw_contact);

        if raw == self.committed {
            // Reversing reading: drop any candidate without emitting.
            self.pending = None;
            return None;
        }

        let since_ms = match self.pending {
            Some(timer) => timer.since_ms,
            None => {
                self.pending = Some(DebounceTimer { since_ms: now_ms });
                now_ms
            }
        };

        let window = match raw {
            ContactState::On => self.on_window_ms,
            ContactState::Off => self.off_window_ms,
        };
        if now_ms.saturating_sub(since_ms) < window {
            return None;
        }

        self.pending = None;
        self.committed = raw;
        Some(match raw {
            ContactState::On => ContactTransition::ToOn,
            ContactState::Off => ContactTransition::ToOff,
        })
    }
}
