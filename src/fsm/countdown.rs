//! Contact-gated two-phase countdown.
//!
//! ```text
//!   Stabilizing(n) ──n reaches 0──▶ Active(m) ──m reaches 0──▶ Elapsed
//! ```
//!
//! Wall-clock time is only applied between two consecutive ticks that both
//! saw contact `On`.  An `Off` tick forgets the last timestamp but keeps
//! the sub-second progress, so a pause never loses (or gains) recorded
//! time.  Remaining values move in whole seconds: progress is accumulated
//! in milliseconds and one second is taken off every time it crosses 1000.

use crate::sensors::ContactState;

const MS_PER_SEC: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStatus {
    Stabilizing(u16),
    Active(u16),
    Elapsed,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    stabilize_secs: u16,
    active_secs: u16,
    stabilize_remaining: u16,
    active_remaining: u16,
    /// On-contact milliseconds not yet taken off a remaining value.
    progress_ms: u64,
    /// Timestamp of the previous `On` tick; `None` while frozen.
    last_on_ms: Option<u64>,
}

impl Countdown {
    pub fn new(stabilize_secs: u16, active_secs: u16) -> Self {
        Self {
            stabilize_secs,
            active_secs,
            stabilize_remaining: stabilize_secs,
            active_remaining: active_secs,
            progress_ms: 0,
            last_on_ms: None,
        }
    }

    /// A countdown with no stabilization phase.
    pub fn single_phase(active_secs: u16) -> Self {
        Self::new(0, active_secs)
    }

    /// Back to full durations, frozen.
    pub fn reset(&mut self) {
        *self = Self::new(self.stabilize_secs, self.active_secs);
    }

    /// Restart stabilization from its full duration.  No effect once the
    /// active phase has begun.
    pub fn rearm_stabilization(&mut self) {
        if matches!(self.status(), CountdownStatus::Stabilizing(_)) {
            self.stabilize_remaining = self.stabilize_secs;
            self.progress_ms = 0;
        }
    }

    pub fn tick(&mut self, contact: ContactState, now_ms: u64) -> CountdownStatus {
        if !contact.is_on() {
            self.last_on_ms = None;
            return self.status();
        }

        if let Some(last) = self.last_on_ms {
            self.progress_ms += now_ms.saturating_sub(last);
        }
        self.last_on_ms = Some(now_ms);

        while self.progress_ms >= MS_PER_SEC {
            if self.stabilize_remaining > 0 {
                self.progress_ms -= MS_PER_SEC;
                self.stabilize_remaining -= 1;
                if self.stabilize_remaining == 0 {
                    // The session switches phase on this tick; the active
                    // window starts counting on the next one.
                    break;
                }
            } else if self.active_remaining > 0 {
                self.progress_ms -= MS_PER_SEC;
                self.active_remaining -= 1;
            } else {
                break;
            }
        }

        self.status()
    }

    pub fn status(&self) -> CountdownStatus {
        if self.stabilize_remaining > 0 {
            CountdownStatus::Stabilizing(self.stabilize_remaining)
        } else if self.active_remaining > 0 {
            CountdownStatus::Active(self.active_remaining)
        } else {
            CountdownStatus::Elapsed
        }
    }

    /// Seconds left in the current phase (0 once elapsed).
    pub fn remaining_secs(&self) -> u16 {
        match self.status() {
            CountdownStatus::Stabilizing(n) | CountdownStatus::Active(n) => n,
            CountdownStatus::Elapsed => 0,
        }
    }

    /// Seconds left across both phases.
    pub fn total_remaining_secs(&self) -> u32 {
        u32::from(self.stabilize_remaining) + u32::from(self.active_remaining)
    }

    /// Whole seconds of active-phase time applied so far.
    pub fn active_elapsed_secs(&self) -> u16 {
        self.active_secs - self.active_remaining
    }

    /// True while the last tick saw no contact (or before the first tick).
    pub fn is_frozen(&self) -> bool {
        self.last_on_ms.is_none()
    }
}
