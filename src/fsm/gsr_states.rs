//! GSR session state handlers and table builder.
//!
//! ```text
//!  IDLE ──[start GSR]──▶ ENTRY ──▶ STREAMING ──[elapsed | buffer full]──▶ COMPLETE ──▶ IDLE
//!    ▲                     │           │
//!    └──────[cancel]───────┴───────────┘  (buffer discarded)
//! ```
//!
//! Single-phase countdown gated on committed BioZ contact.  The GSR path
//! holds only the BioZ lease and its own buffer, so it runs alongside an
//! ECG / HRV session without sharing data with it.

use log::info;

use super::context::{Recording, SessionContext, SessionEffect};
use super::countdown::{Countdown, CountdownStatus};
use super::leases::LeaseHolder;
use super::{GsrState, SessionMode, StateDescriptor, StateKey};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_gsr_table() -> [StateDescriptor<GsrState, SessionContext>; GsrState::COUNT] {
    [
        StateDescriptor {
            id: GsrState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: GsrState::Entry,
            name: "GsrEntry",
            on_enter: Some(entry_enter),
            on_exit: None,
            on_update: entry_update,
        },
        StateDescriptor {
            id: GsrState::Streaming,
            name: "GsrStreaming",
            on_enter: Some(streaming_enter),
            on_exit: Some(streaming_exit),
            on_update: streaming_update,
        },
        StateDescriptor {
            id: GsrState::Complete,
            name: "GsrComplete",
            on_enter: Some(complete_enter),
            on_exit: None,
            on_update: complete_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut SessionContext) {
    let s = &mut ctx.gsr;
    s.cancel_requested = false;
    s.cancelled = false;
    s.buffer_full = false;
    s.armed = false;
    s.streaming = false;
    s.countdown.reset();
    s.recording = None;
    ctx.leases.bioz.release(LeaseHolder::GsrSession);
}

fn idle_update(ctx: &mut SessionContext) -> Option<GsrState> {
    core::mem::take(&mut ctx.gsr.requested).then_some(GsrState::Entry)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ENTRY
// ═══════════════════════════════════════════════════════════════════════════

fn entry_enter(ctx: &mut SessionContext) {
    let now = ctx.now_ms;
    let s = &mut ctx.gsr;
    s.armed = true;
    s.contact.reset();
    s.countdown = Countdown::single_phase(ctx.config.gsr_duration_secs);
    s.recording = Some(Recording::new(SessionMode::Gsr, now));
    ctx.leases.bioz.acquire(LeaseHolder::GsrSession);
    info!("GSR: session armed ({}s)", ctx.config.gsr_duration_secs);
}

fn entry_update(ctx: &mut SessionContext) -> Option<GsrState> {
    let s = &mut ctx.gsr;
    if s.cancel_requested {
        s.cancelled = true;
        info!("GSR: cancelled before streaming");
        return Some(GsrState::Idle);
    }
    Some(GsrState::Streaming)
}

// ═══════════════════════════════════════════════════════════════════════════
//  STREAMING
// ═══════════════════════════════════════════════════════════════════════════

fn streaming_enter(ctx: &mut SessionContext) {
    ctx.gsr.streaming = true;
}

fn streaming_update(ctx: &mut SessionContext) -> Option<GsrState> {
    let now = ctx.now_ms;
    let s = &mut ctx.gsr;

    if s.cancel_requested {
        s.cancelled = true;
        info!("GSR: cancelled, buffer discarded");
        return Some(GsrState::Idle);
    }

    if s.buffer_full {
        info!("GSR: buffer full, completing early");
        return Some(GsrState::Complete);
    }

    let contact = s.contact.committed();
    match s.countdown.tick(contact, now) {
        CountdownStatus::Elapsed => Some(GsrState::Complete),
        CountdownStatus::Stabilizing(_) | CountdownStatus::Active(_) => None,
    }
}

fn streaming_exit(ctx: &mut SessionContext) {
    ctx.gsr.streaming = false;
}

// ═══════════════════════════════════════════════════════════════════════════
//  COMPLETE
// ═══════════════════════════════════════════════════════════════════════════

fn complete_enter(ctx: &mut SessionContext) {
    if let Some(rec) = ctx.gsr.recording.take() {
        info!("GSR: complete ({} BioZ samples)", rec.bioz.len());
        ctx.push_effect(SessionEffect::Completed(rec));
    }
}

fn complete_update(_ctx: &mut SessionContext) -> Option<GsrState> {
    Some(GsrState::Idle)
}
