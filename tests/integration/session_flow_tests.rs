//! Integration tests for the ECG / HRV path: SessionService → FSM →
//! AFE control, storage and completion signals.

use crate::mock_hw::{AfeCall, Harness};

use vitalband::app::commands::SessionCommand;
use vitalband::app::events::{AppEvent, SessionSignal};
use vitalband::app::ports::Hand;
use vitalband::channels::{InboxMsg, SamplerControl};
use vitalband::error::HwError;
use vitalband::fsm::{RecordingPhase, SessionMode, SessionOwner, SessionState};

const ACTIVE: SessionState = SessionState::Recording { phase: RecordingPhase::Active };
const STABILIZING: SessionState = SessionState::Recording { phase: RecordingPhase::Stabilizing };

fn done(signal: SessionSignal) -> impl FnMut(&Harness) -> bool {
    move |h| h.signals.contains(&signal)
}

// ── Normal completion ─────────────────────────────────────────

#[test]
fn ecg_session_completes_and_hands_off_recording() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);

    let t = h.run_while(40_000, true, true, done(SessionSignal::EcgComplete));
    assert!(t.is_some(), "ECG session never completed");

    assert_eq!(h.env.persisted.len(), 1);
    let rec = &h.env.persisted[0];
    assert_eq!(rec.mode, SessionMode::Ecg);
    assert!((299..=301).contains(&rec.ecg.len()), "buffered {} samples", rec.ecg.len());
    assert!(rec.rr_intervals.is_empty());

    assert_eq!(h.svc.owner(), SessionOwner::None);
    assert_eq!(
        h.afe.calls,
        [AfeCall::EnableEcg, AfeCall::EnableBioz, AfeCall::DisableEcg, AfeCall::DisableBioz]
    );
    assert_eq!(
        h.sampler,
        [
            SamplerControl::BeginEcgSession { invert_ecg: false },
            SamplerControl::Start,
            SamplerControl::Stop,
        ]
    );
}

#[test]
fn right_hand_orientation_inverts_ecg() {
    let mut h = Harness::new();
    h.env.hand = Hand::Right;
    h.command(SessionCommand::StartHrv);
    h.step(false, false);
    assert_eq!(h.sampler.first(), Some(&SamplerControl::BeginEcgSession { invert_ecg: true }));
}

// ── Lead timeout (no contact within 15 s) ─────────────────────

#[test]
fn lead_timeout_fires_at_fifteen_seconds_and_returns_to_idle() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);

    let t = h.run_while(20_000, false, false, done(SessionSignal::LeadTimeout));
    assert_eq!(t, Some(15_000));
    assert_eq!(h.svc.ecg_session_state(), SessionState::Idle);

    h.step(false, false);
    assert_eq!(h.svc.ecg_session_state(), SessionState::Idle);
    assert!(h.env.persisted.is_empty());
    assert!(!h.afe.ecg_on && !h.afe.bioz_on);
}

// ── Contact pause during the active phase ─────────────────────

#[test]
fn contact_loss_during_active_phase_freezes_and_resumes() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);

    let pause_at = h
        .run_while(40_000, true, true, |h| {
            let s = h.svc.status();
            s.state == ACTIVE && s.remaining_seconds == 20
        })
        .expect("never reached 20 s remaining");

    let mut states = Vec::new();
    for _ in 0..50 {
        h.step(false, false);
        states.push(h.svc.ecg_session_state());
    }
    assert!(states.iter().all(|&s| s == ACTIVE), "pause must not change state");
    // The off-debounce window still counts as contact, but not a full second.
    assert_eq!(h.svc.status().remaining_seconds, 20);

    let done_at = h
        .run_while(80_000, true, true, done(SessionSignal::EcgComplete))
        .expect("never completed after resume");
    let elapsed = done_at - pause_at;
    assert!((24_800..=25_400).contains(&elapsed), "completed {elapsed} ms after pause");

    let rec = &h.env.persisted[0];
    assert!((299..=302).contains(&rec.ecg.len()), "buffered {} samples", rec.ecg.len());

    // Stabilization is never re-entered once active.
    let back_to_stabilizing = h.sink.events.iter().any(|e| {
        matches!(e, AppEvent::StateChanged { from, to, .. } if *from == ACTIVE && *to == STABILIZING)
    });
    assert!(!back_to_stabilizing);
}

// ── HRV ───────────────────────────────────────────────────────

#[test]
fn hrv_restart_starts_with_empty_interval_buffer() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartHrv);
    h.run_while(20_000, true, true, |h| h.svc.status().state == ACTIVE)
        .expect("first HRV session never went active");
    h.run_until(h.now_ms + 10_000, true, true);
    h.cancel();
    h.step(true, true);
    assert_eq!(h.svc.owner(), SessionOwner::None);
    assert!(h.env.analyzed.is_empty());

    h.command(SessionCommand::StartHrv);
    h.run_while(h.now_ms + 80_000, true, true, |h| {
        h.signals.iter().any(|s| matches!(s, SessionSignal::HrvComplete(_)))
    })
    .expect("second HRV session never completed");

    assert_eq!(h.env.analyzed.len(), 1);
    let intervals = &h.env.analyzed[0];
    assert!((599..=601).contains(&intervals.len()), "{} intervals", intervals.len());
    assert!(intervals.iter().all(|&rr| rr == 800));

    let rec = &h.env.persisted[0];
    assert_eq!(rec.mode, SessionMode::Hrv);
    assert_eq!(&rec.rr_intervals, intervals);
    assert_eq!(
        h.signals.last(),
        Some(&SessionSignal::HrvComplete(vitalband::app::events::HrvResult {
            interval_count: intervals.len() as u16,
            ..Default::default()
        }))
    );
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn in_flight_batches_after_cancel_are_discarded() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);
    h.run_while(20_000, true, true, |h| h.svc.status().state == ACTIVE)
        .expect("never went active");
    h.run_until(h.now_ms + 3_000, true, true);

    h.cancel();
    for _ in 0..3 {
        h.feed(true, true);
    }
    h.poll();
    h.run_until(h.now_ms + 1_000, true, true);

    assert_eq!(h.svc.ecg_session_state(), SessionState::Idle);
    assert!(h.env.persisted.is_empty());
    assert!(h.signals.is_empty());
    assert!(!h.afe.ecg_on && !h.afe.bioz_on);
}

#[test]
fn cancel_during_wait_for_contact() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);
    h.run_until(2_000, false, false);
    h.cancel();
    h.step(false, false);
    assert_eq!(h.svc.ecg_session_state(), SessionState::Idle);
    assert!(h.signals.is_empty(), "cancel is silent, unlike a lead timeout");
}

// ── Start arbitration ─────────────────────────────────────────

#[test]
fn rapid_conflicting_starts_keep_first_request() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);
    h.command(SessionCommand::StartHrv);
    h.command(SessionCommand::StartEcg);
    h.step(false, false);

    assert_eq!(h.svc.owner(), SessionOwner::Ecg);
    assert_eq!(h.rejections(), 2);

    h.command(SessionCommand::StartHrv);
    h.step(false, false);
    assert_eq!(h.svc.owner(), SessionOwner::Ecg);
    assert_eq!(h.rejections(), 3);
    assert!(h.sink.events.contains(&AppEvent::SessionRejected {
        requested: SessionMode::Hrv,
        owner: SessionOwner::Ecg,
    }));
}

// ── Hardware failure ──────────────────────────────────────────

#[test]
fn enable_failure_aborts_session_without_retry() {
    let mut h = Harness::new();
    h.afe.fail_on = Some(AfeCall::EnableEcg);
    h.command(SessionCommand::StartEcg);
    h.step(true, true);

    assert_eq!(h.svc.ecg_session_state(), SessionState::Idle);
    assert!(h.sink.events.contains(&AppEvent::SessionAborted {
        mode: SessionMode::Ecg,
        error: HwError::NotResponding,
    }));
    assert_eq!(h.afe.calls, [AfeCall::EnableEcg, AfeCall::DisableEcg]);

    h.run_until(2_000, true, true);
    assert_eq!(h.afe.count(AfeCall::EnableEcg), 1, "no automatic retry");
    assert!(!h.svc.sampler_running());
}

#[test]
fn read_failure_aborts_every_session() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.command(SessionCommand::StartEcg);
    h.run_until(3_000, true, true);
    assert_eq!(h.svc.owner(), SessionOwner::Ecg);

    h.inject(InboxMsg::ReadFailed(HwError::Bus));
    h.poll();

    assert_eq!(h.svc.owner(), SessionOwner::None);
    let aborted = h
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::SessionAborted { error: HwError::Bus, .. }))
        .count();
    assert_eq!(aborted, 2);
    assert!(!h.afe.ecg_on && !h.afe.bioz_on);
    assert_eq!(h.sampler.last(), Some(&SamplerControl::Stop));
    assert!(h.env.persisted.is_empty());
}

// ── Status publication ────────────────────────────────────────

#[test]
fn status_refreshes_while_session_active() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);

    let mut published = 0;
    for _ in 0..30 {
        h.step(false, false);
        if let Some(s) = h.status() {
            assert_eq!(s.owner, SessionOwner::Ecg);
            assert_eq!(s.state, SessionState::WaitForContact);
            published += 1;
        }
    }
    assert!(published >= 3, "only {published} snapshots in 3 s");
    assert_eq!(h.svc.status().remaining_seconds, 15 - 2);
}

#[test]
fn vitals_tracked_without_a_session() {
    let mut h = Harness::new();
    h.step(true, false);
    let v = h.svc.vitals();
    assert_eq!(v.heart_rate, 75);
    assert_eq!(v.rr_interval_ms, 800);
    assert!(v.ecg_contact);
    assert!(!v.bioz_contact);
    assert!(h.afe.calls.is_empty());
}
