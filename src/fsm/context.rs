//! Shared mutable context threaded through every FSM handler.
//!
//! `SessionContext` is the blackboard both session tables read from and
//! write to: per-session working state, channel leases, the effect queue
//! the service drains after each tick, and the aggregate vitals.  It is
//! owned by the service on the FSM thread; nothing outside that thread
//! ever holds a reference to it.

use heapless::Vec as BoundedVec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::sensors::lead_contact::{ContactTransition, LeadDebouncer};
use crate::sensors::{ContactState, SampleBatch};

use super::countdown::Countdown;
use super::leases::HwLeases;
use super::{RecordingPhase, SessionMode};

/// Effects one poll can queue (arm + timeout + two completions, with slack).
pub const MAX_EFFECTS: usize = 8;

// ---------------------------------------------------------------------------
// Recording (handed to storage on completion)
// ---------------------------------------------------------------------------

/// Samples accumulated by one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub mode: SessionMode,
    /// Monotonic time the session started (ms since boot).
    pub started_ms: u64,
    pub ecg: Vec<i32>,
    pub bioz: Vec<i32>,
    /// R-to-R intervals (ms).  Only HRV recordings carry any.
    pub rr_intervals: Vec<u16>,
}

impl Recording {
    pub fn new(mode: SessionMode, started_ms: u64) -> Self {
        Self {
            mode,
            started_ms,
            ecg: Vec::new(),
            bioz: Vec::new(),
            rr_intervals: Vec::new(),
        }
    }
}

/// Work the handlers hand back to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// WaitForContact entered: latch lead polarity and reset smoothing.
    EcgArmed,
    /// No contact within the lead timeout.
    LeadTimeout,
    /// A session finished without cancellation.
    Completed(Recording),
}

// ---------------------------------------------------------------------------
// Aggregate vitals (process-wide, no teardown)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LastVitals {
    pub heart_rate: u16,
    pub rr_interval_ms: u16,
    /// Raw ECG contact from the most recent batch.
    pub ecg_contact: bool,
    /// Raw BioZ contact from the most recent batch.
    pub bioz_contact: bool,
}

impl LastVitals {
    fn update(&mut self, batch: &SampleBatch) {
        if batch.heart_rate != 0 {
            self.heart_rate = batch.heart_rate;
        }
        if batch.rr_updated {
            self.rr_interval_ms = batch.rr_interval_ms;
        }
        self.ecg_contact = batch.ecg_contact();
        self.bioz_contact = batch.bioz_contact();
    }
}

// ---------------------------------------------------------------------------
// ECG / HRV session working state
// ---------------------------------------------------------------------------

pub struct EcgSession {
    /// Pending start request, consumed by the Idle handler.
    pub requested: Option<SessionMode>,
    /// Fixed from WaitForContact entry until the next Idle.
    pub mode: SessionMode,
    /// Set by the service (user cancel or hardware failure); observed by
    /// the next update.
    pub cancel_requested: bool,
    /// Data from this session must not be persisted.
    pub cancelled: bool,
    pub hrv_active: bool,
    pub buffering: bool,
    pub buffer_full: bool,
    pub phase: RecordingPhase,
    /// True from WaitForContact entry until Idle entry.
    pub armed: bool,
    pub contact: LeadDebouncer,
    /// Latched `ToOn` edge, cleared by the handler that consumes it.
    pub contact_regained: bool,
    pub countdown: Countdown,
    pub wait_started_ms: u64,
    pub recording: Option<Recording>,
    /// HRV interval buffer; cleared when the active phase starts.
    pub intervals: Vec<u16>,
}

impl EcgSession {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            requested: None,
            mode: SessionMode::Ecg,
            cancel_requested: false,
            cancelled: false,
            hrv_active: false,
            buffering: false,
            buffer_full: false,
            phase: RecordingPhase::Stabilizing,
            armed: false,
            contact: LeadDebouncer::new(config.lead_on_debounce_ms, config.lead_off_debounce_ms),
            contact_regained: false,
            countdown: Countdown::new(config.stabilization_secs, config.ecg_duration_secs),
            wait_started_ms: 0,
            recording: None,
            intervals: Vec::with_capacity(config.interval_capacity),
        }
    }

    /// Countdown for `mode`'s active window.
    pub fn countdown_for(mode: SessionMode, config: &SystemConfig) -> Countdown {
        let active = match mode {
            SessionMode::Hrv => config.hrv_duration_secs,
            SessionMode::Ecg | SessionMode::Gsr => config.ecg_duration_secs,
        };
        Countdown::new(config.stabilization_secs, active)
    }

    pub fn accepts_samples(&self) -> bool {
        self.armed
            && self.buffering
            && self.contact.committed().is_on()
            && !self.cancelled
            && !self.cancel_requested
    }

    fn append(&mut self, batch: &SampleBatch, config: &SystemConfig) {
        let Some(rec) = self.recording.as_mut() else {
            return;
        };

        let cap = config.recording_capacity;
        let ecg_room = cap.saturating_sub(rec.ecg.len());
        rec.ecg.extend_from_slice(&batch.ecg[..batch.ecg.len().min(ecg_room)]);
        let bioz_room = cap.saturating_sub(rec.bioz.len());
        rec.bioz.extend_from_slice(&batch.bioz[..batch.bioz.len().min(bioz_room)]);

        if self.hrv_active && batch.rr_updated {
            if self.intervals.len() < config.interval_capacity {
                self.intervals.push(batch.rr_interval_ms);
            } else {
                warn!("HRV: interval buffer full, dropping {} ms", batch.rr_interval_ms);
            }
        }

        if rec.ecg.len() >= cap && !self.buffer_full {
            info!("ECG: recording buffer full ({cap} samples)");
            self.buffer_full = true;
        }
    }
}

// ---------------------------------------------------------------------------
// GSR session working state
// ---------------------------------------------------------------------------

pub struct GsrSession {
    pub requested: bool,
    pub cancel_requested: bool,
    pub cancelled: bool,
    pub buffer_full: bool,
    /// True from GsrEntry until Idle entry.
    pub armed: bool,
    pub streaming: bool,
    pub contact: LeadDebouncer,
    pub countdown: Countdown,
    pub recording: Option<Recording>,
}

impl GsrSession {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            requested: false,
            cancel_requested: false,
            cancelled: false,
            buffer_full: false,
            armed: false,
            streaming: false,
            contact: LeadDebouncer::new(config.lead_on_debounce_ms, config.lead_off_debounce_ms),
            countdown: Countdown::single_phase(config.gsr_duration_secs),
            recording: None,
        }
    }

    pub fn accepts_samples(&self) -> bool {
        self.armed
            && self.streaming
            && self.contact.committed().is_on()
            && !self.cancelled
            && !self.cancel_requested
    }

    fn append(&mut self, batch: &SampleBatch, config: &SystemConfig) {
        let Some(rec) = self.recording.as_mut() else {
            return;
        };

        let cap = config.gsr_capacity;
        let room = cap.saturating_sub(rec.bioz.len());
        rec.bioz.extend_from_slice(&batch.bioz[..batch.bioz.len().min(room)]);

        if rec.bioz.len() >= cap && !self.buffer_full {
            info!("GSR: recording buffer full ({cap} samples)");
            self.buffer_full = true;
        }
    }
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct SessionContext {
    /// Monotonic time of the current poll (ms since boot).
    pub now_ms: u64,
    pub config: SystemConfig,
    pub ecg: EcgSession,
    pub gsr: GsrSession,
    pub leases: HwLeases,
    /// Drained by the service after every tick.
    pub effects: BoundedVec<SessionEffect, MAX_EFFECTS>,
    pub vitals: LastVitals,
}

impl SessionContext {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            now_ms: 0,
            ecg: EcgSession::new(&config),
            gsr: GsrSession::new(&config),
            config,
            leases: HwLeases::default(),
            effects: BoundedVec::new(),
            vitals: LastVitals::default(),
        }
    }

    pub fn push_effect(&mut self, effect: SessionEffect) {
        if let Err(dropped) = self.effects.push(effect) {
            warn!("FSM: effect queue full, dropping {:?}", dropped);
        }
    }

    pub fn take_effects(&mut self) -> BoundedVec<SessionEffect, MAX_EFFECTS> {
        core::mem::take(&mut self.effects)
    }

    /// Apply one decoded batch: vitals, debouncers, then buffers.
    ///
    /// Contact edges are latched here so the following FSM tick sees them
    /// before it advances any countdown.
    pub fn ingest(&mut self, batch: &SampleBatch) {
        self.vitals.update(batch);

        if self.ecg.armed {
            match self.ecg.contact.observe(batch.ecg_contact(), batch.timestamp_ms) {
                Some(ContactTransition::ToOn) => {
                    info!("ECG: lead contact confirmed");
                    self.ecg.contact_regained = true;
                }
                Some(ContactTransition::ToOff) => info!("ECG: leads off"),
                None => {}
            }
            if self.ecg.accepts_samples() {
                self.ecg.append(batch, &self.config);
            }
        }

        if self.gsr.armed {
            match self.gsr.contact.observe(batch.bioz_contact(), batch.timestamp_ms) {
                Some(ContactTransition::ToOn) => info!("GSR: skin contact confirmed"),
                Some(ContactTransition::ToOff) => info!("GSR: skin contact lost"),
                None => {}
            }
            if self.gsr.accepts_samples() {
                self.gsr.append(batch, &self.config);
            }
        }
    }

    pub fn ecg_contact(&self) -> ContactState {
        self.ecg.contact.committed()
    }

    pub fn bioz_contact(&self) -> ContactState {
        self.gsr.contact.committed()
    }
}
