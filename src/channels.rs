//! Inter-task links between the sampling worker, the session FSM and the
//! display layer.
//!
//! Uses `embassy-sync` bounded channels and single-slot signals so the
//! tasks share state only by message.  Everything is const-constructible,
//! so the binary keeps one [`SessionLinks`] in a `static`.
//!
//! ```text
//!                 SamplerControl                 commands / cancel
//! ┌──────────┐ ◀──────────────── ┌────────────┐ ◀──────────────── ┌─────────┐
//! │ Sampler  │                   │ Session FSM│                   │   UI    │
//! │ (worker) │ ────────────────▶ │  (100 ms)  │ ────────────────▶ │(display)│
//! └──────────┘  InboxMsg (batch) └────────────┘  plot · signal ·  └─────────┘
//!                                                status
//! ```
//!
//! Queues never block a producer: a full queue drops the newest item and
//! logs.  Status uses a latest-wins slot.  Each completion signal kind has
//! its own latest-wins slot, so signals from the ECG and GSR paths raised
//! in the same poll never overwrite each other.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::warn;

use crate::app::commands::SessionCommand;
use crate::app::events::{HrvResult, SessionSignal, StatusSnapshot};
use crate::error::HwError;
use crate::sensors::SampleBatch;

/// Channel depth for UI → FSM commands.
pub const COMMAND_DEPTH: usize = 4;

/// Channel depth for sampler → FSM messages.
pub const INBOX_DEPTH: usize = 8;

/// Channel depth for FSM → sampler control.
pub const SAMPLER_DEPTH: usize = 4;

/// Channel depth for FSM → display live-plot batches.
pub const PLOT_DEPTH: usize = 4;

type Queue<T, const N: usize> = Channel<CriticalSectionRawMutex, T, N>;
type Slot<T> = Signal<CriticalSectionRawMutex, T>;

/// Sampler → FSM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxMsg {
    Batch(SampleBatch),
    /// A burst read (or FIFO recovery) failed; the worker has stopped.
    ReadFailed(HwError),
}

/// FSM → sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerControl {
    Start,
    Stop,
    /// A new ECG session is waiting for contact: reset smoothing and latch
    /// lead polarity.
    BeginEcgSession { invert_ecg: bool },
}

/// One-shot slots, one per [`SessionSignal`] kind.
pub struct SignalSlots {
    pub ecg_complete: Slot<()>,
    pub hrv_complete: Slot<HrvResult>,
    pub gsr_complete: Slot<()>,
    pub lead_timeout: Slot<()>,
}

impl SignalSlots {
    pub const fn new() -> Self {
        Self {
            ecg_complete: Signal::new(),
            hrv_complete: Signal::new(),
            gsr_complete: Signal::new(),
            lead_timeout: Signal::new(),
        }
    }

    pub fn publish(&self, signal: SessionSignal) {
        match signal {
            SessionSignal::EcgComplete => self.ecg_complete.signal(()),
            SessionSignal::HrvComplete(result) => self.hrv_complete.signal(result),
            SessionSignal::GsrComplete => self.gsr_complete.signal(()),
            SessionSignal::LeadTimeout => self.lead_timeout.signal(()),
        }
    }

    /// Take every pending signal, in a fixed order.
    pub fn take_pending(&self) -> heapless::Vec<SessionSignal, 4> {
        let mut pending = heapless::Vec::new();
        let taken = [
            self.ecg_complete.try_take().map(|()| SessionSignal::EcgComplete),
            self.hrv_complete.try_take().map(SessionSignal::HrvComplete),
            self.gsr_complete.try_take().map(|()| SessionSignal::GsrComplete),
            self.lead_timeout.try_take().map(|()| SessionSignal::LeadTimeout),
        ];
        for signal in taken.into_iter().flatten() {
            // Four kinds, four slots.
            let _ = pending.push(signal);
        }
        pending
    }
}

impl Default for SignalSlots {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SessionLinks {
    pub commands: Queue<SessionCommand, COMMAND_DEPTH>,
    pub cancel: Slot<()>,
    pub inbox: Queue<InboxMsg, INBOX_DEPTH>,
    pub sampler: Queue<SamplerControl, SAMPLER_DEPTH>,
    pub plot: Queue<SampleBatch, PLOT_DEPTH>,
    pub signals: SignalSlots,
    pub status: Slot<StatusSnapshot>,
}

impl SessionLinks {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            cancel: Signal::new(),
            inbox: Channel::new(),
            sampler: Channel::new(),
            plot: Channel::new(),
            signals: SignalSlots::new(),
            status: Signal::new(),
        }
    }
}

impl Default for SessionLinks {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking send.  On a full queue the item is dropped and logged.
/// Returns whether the item was queued.
pub fn post<T, const N: usize>(queue: &Queue<T, N>, item: T, what: &'static str) -> bool {
    if queue.try_send(item).is_err() {
        warn!("{}: queue full, dropping newest", what);
        return false;
    }
    true
}
