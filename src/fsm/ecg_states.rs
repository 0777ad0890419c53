//! ECG / HRV session state handlers and table builder.
//!
//! ```text
//!  IDLE ──[start ECG | start HRV]──▶ WAIT_FOR_CONTACT ──[timeout 15 s]──▶ IDLE (+LeadTimeout)
//!    ▲                                      │
//!    │                              [contact confirmed]
//!    │                                      ▼
//!    │                        RECORDING { Stabilizing ─▶ Active }
//!    │                                      │
//!    └───[elapsed | buffer full | cancel]───┘
//! ```
//!
//! Contact loss never changes state: it only freezes the countdown.  A
//! regained contact during stabilization restarts it from full duration;
//! during the active phase it simply resumes.

use core::mem;

use log::{info, warn};

use super::context::{EcgSession, Recording, SessionContext, SessionEffect};
use super::countdown::CountdownStatus;
use super::{EcgState, RecordingPhase, SessionMode, StateDescriptor, StateKey};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_ecg_table() -> [StateDescriptor<EcgState, SessionContext>; EcgState::COUNT] {
    [
        StateDescriptor {
            id: EcgState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: EcgState::WaitForContact,
            name: "WaitForContact",
            on_enter: Some(wait_enter),
            on_exit: None,
            on_update: wait_update,
        },
        StateDescriptor {
            id: EcgState::Recording,
            name: "Recording",
            on_enter: Some(recording_enter),
            on_exit: Some(recording_exit),
            on_update: recording_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut SessionContext) {
    let s = &mut ctx.ecg;
    s.cancel_requested = false;
    s.cancelled = false;
    s.hrv_active = false;
    s.buffering = false;
    s.buffer_full = false;
    s.armed = false;
    s.contact_regained = false;
    s.phase = RecordingPhase::Stabilizing;
    s.countdown.reset();
    s.recording = None;
    ctx.leases.release_ecg_session();
}

fn idle_update(ctx: &mut SessionContext) -> Option<EcgState> {
    let mode = ctx.ecg.requested.take()?;
    ctx.ecg.mode = mode;
    Some(EcgState::WaitForContact)
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAIT_FOR_CONTACT
// ═══════════════════════════════════════════════════════════════════════════

fn wait_enter(ctx: &mut SessionContext) {
    let now = ctx.now_ms;
    let mode = ctx.ecg.mode;
    let s = &mut ctx.ecg;
    s.armed = true;
    s.wait_started_ms = now;
    s.contact.reset();
    s.contact_regained = false;
    s.countdown = EcgSession::countdown_for(mode, &ctx.config);
    s.recording = Some(Recording::new(mode, now));

    ctx.leases.acquire_ecg_session();
    ctx.push_effect(SessionEffect::EcgArmed);
    info!(
        "ECG: {:?} session waiting for lead contact ({}s timeout)",
        mode, ctx.config.lead_timeout_secs
    );
}

fn wait_update(ctx: &mut SessionContext) -> Option<EcgState> {
    let timeout_ms = u64::from(ctx.config.lead_timeout_secs) * 1000;
    let waited_ms = ctx.now_ms.saturating_sub(ctx.ecg.wait_started_ms);
    let s = &mut ctx.ecg;

    if s.cancel_requested {
        s.cancelled = true;
        info!("ECG: cancelled while waiting for contact");
        return Some(EcgState::Idle);
    }

    if mem::take(&mut s.contact_regained) {
        return Some(EcgState::Recording);
    }

    if waited_ms >= timeout_ms {
        s.cancelled = true;
        warn!("ECG: no lead contact after {} ms, giving up", waited_ms);
        ctx.push_effect(SessionEffect::LeadTimeout);
        return Some(EcgState::Idle);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RECORDING: stabilization, then active buffering
// ═══════════════════════════════════════════════════════════════════════════

fn recording_enter(ctx: &mut SessionContext) {
    let s = &mut ctx.ecg;
    s.phase = RecordingPhase::Stabilizing;
    s.buffering = false;
    s.countdown.reset();
    info!("ECG: stabilizing for {}s", ctx.config.stabilization_secs);
}

fn recording_update(ctx: &mut SessionContext) -> Option<EcgState> {
    let now = ctx.now_ms;
    let s = &mut ctx.ecg;

    if s.cancel_requested {
        s.cancelled = true;
        info!("ECG: cancelled during {:?} phase", s.phase);
        return Some(EcgState::Idle);
    }

    if mem::take(&mut s.contact_regained) && s.phase == RecordingPhase::Stabilizing {
        s.countdown.rearm_stabilization();
        info!("ECG: contact regained, stabilization restarted");
    }

    let contact = s.contact.committed();
    match s.countdown.tick(contact, now) {
        CountdownStatus::Stabilizing(_) => None,
        CountdownStatus::Active(remaining) => {
            if s.phase == RecordingPhase::Stabilizing {
                begin_active(s, remaining);
            }
            s.buffer_full.then_some(EcgState::Idle)
        }
        CountdownStatus::Elapsed => {
            info!("ECG: {:?} recording window elapsed", s.mode);
            Some(EcgState::Idle)
        }
    }
}

fn begin_active(s: &mut EcgSession, remaining: u16) {
    s.phase = RecordingPhase::Active;
    s.buffering = true;
    if s.mode == SessionMode::Hrv {
        s.hrv_active = true;
        s.intervals.clear();
    }
    info!("ECG: recording {:?} for {}s", s.mode, remaining);
}

fn recording_exit(ctx: &mut SessionContext) {
    let s = &mut ctx.ecg;
    s.buffering = false;
    let recording = s.recording.take();

    if s.cancelled {
        info!("ECG: partial recording discarded");
        return;
    }

    if let Some(mut rec) = recording {
        if s.hrv_active {
            rec.rr_intervals = mem::take(&mut s.intervals);
        }
        info!(
            "ECG: {:?} complete ({} ECG, {} BioZ, {} RR)",
            rec.mode,
            rec.ecg.len(),
            rec.bioz.len(),
            rec.rr_intervals.len()
        );
        ctx.push_effect(SessionEffect::Completed(rec));
    }
}
