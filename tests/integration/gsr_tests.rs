//! Integration tests for the GSR path and its overlap with ECG / HRV.

use crate::mock_hw::{AfeCall, Harness};

use vitalband::app::commands::SessionCommand;
use vitalband::app::events::SessionSignal;
use vitalband::channels::SamplerControl;
use vitalband::fsm::{GsrState, SessionMode, SessionOwner, SessionState};

#[test]
fn gsr_session_streams_bioz_only_and_completes() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);

    let t = h
        .run_while(40_000, false, true, |h| h.signals.contains(&SessionSignal::GsrComplete))
        .expect("GSR never completed");
    // 500 ms debounce, then 30 s of confirmed BioZ contact.
    assert!((30_500..=30_800).contains(&t), "completed at {t}");

    h.step(false, true);
    assert_eq!(h.svc.owner(), SessionOwner::None);
    assert_eq!(h.afe.calls, [AfeCall::EnableBioz, AfeCall::DisableBioz]);

    let rec = &h.env.persisted[0];
    assert_eq!(rec.mode, SessionMode::Gsr);
    assert!(rec.ecg.is_empty());
    assert!(rec.bioz.len() >= 295, "buffered {} BioZ samples", rec.bioz.len());
    assert!(rec.bioz.iter().all(|&s| s <= 0));
}

#[test]
fn gsr_countdown_frozen_while_bioz_contact_missing() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.run_until(40_000, true, false);

    assert_eq!(h.svc.gsr_state(), GsrState::Streaming);
    let s = h.svc.status();
    assert_eq!(s.owner, SessionOwner::Gsr);
    assert_eq!(s.remaining_seconds, 30);
    assert_eq!(s.elapsed_seconds, 0);
}

#[test]
fn gsr_status_published_every_streaming_poll() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.step(false, true);

    let mut published = 0;
    for _ in 0..10 {
        h.step(false, true);
        if let Some(s) = h.status() {
            assert_eq!(s.state, SessionState::GsrStreaming);
            published += 1;
        }
    }
    assert_eq!(published, 10);
}

#[test]
fn duplicate_gsr_start_rejected() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.step(false, true);
    h.command(SessionCommand::StartGsr);
    h.step(false, true);
    assert_eq!(h.rejections(), 1);
    assert_eq!(h.svc.gsr_state(), GsrState::Streaming);
}

#[test]
fn buffer_full_signal_completes_gsr_early() {
    let mut h = Harness::new();
    h.command(SessionCommand::GsrBufferFull);
    h.step(false, true);
    assert!(h.signals.is_empty(), "buffer-full is ignored while idle");

    h.command(SessionCommand::StartGsr);
    h.run_until(3_000, false, true);
    h.command(SessionCommand::GsrBufferFull);
    h.step(false, true);

    assert_eq!(h.signals, [SessionSignal::GsrComplete]);
    assert_eq!(h.env.persisted.len(), 1);
    assert!(!h.env.persisted[0].bioz.is_empty());
}

// ── Overlap with ECG / HRV ────────────────────────────────────

#[test]
fn ecg_during_gsr_shares_bioz_but_not_buffers() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.run_until(2_000, true, true);

    h.command(SessionCommand::StartEcg);
    h.step(true, true);
    assert_eq!(h.svc.owner(), SessionOwner::Ecg);
    assert_eq!(h.svc.gsr_state(), GsrState::Streaming);
    assert_eq!(h.afe.count(AfeCall::EnableBioz), 1);
    assert_eq!(h.afe.count(AfeCall::EnableEcg), 1);
    assert_eq!(h.rejections(), 0);

    h.run_while(45_000, true, true, |h| h.signals.contains(&SessionSignal::GsrComplete))
        .expect("GSR never completed");
    h.step(true, true);
    assert_eq!(h.svc.gsr_state(), GsrState::Idle);
    assert_eq!(h.afe.count(AfeCall::DisableBioz), 0, "ECG session still needs BioZ");
    assert!(h.afe.bioz_on);

    h.run_while(45_000, true, true, |h| h.signals.contains(&SessionSignal::EcgComplete))
        .expect("ECG never completed");
    assert!(!h.afe.ecg_on && !h.afe.bioz_on);
    assert_eq!(h.sampler.last(), Some(&SamplerControl::Stop));

    let modes: Vec<_> = h.env.persisted.iter().map(|r| r.mode).collect();
    assert_eq!(modes, [SessionMode::Gsr, SessionMode::Ecg]);
    let (gsr, ecg) = (&h.env.persisted[0], &h.env.persisted[1]);
    assert!(gsr.ecg.is_empty());
    assert!(!ecg.ecg.is_empty());
    // Each session kept its own BioZ buffer from its own start time.
    assert_ne!(gsr.bioz.first(), ecg.bioz.first());
    assert!(gsr.bioz.last() > ecg.bioz.last());
}

#[test]
fn gsr_progress_reported_while_ecg_in_foreground() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.run_until(2_000, true, true);
    h.command(SessionCommand::StartEcg);
    h.step(true, true);

    let first = h.status().expect("status published while GSR streams");
    assert_eq!(first.owner, SessionOwner::Ecg);
    let first_gsr = first.gsr.expect("GSR progress missing under ECG foreground");
    assert_eq!(first_gsr.state, SessionState::GsrStreaming);

    h.run_until(h.now_ms + 5_000, true, true);
    let later = h.status().expect("status published while GSR streams");
    assert_eq!(later.owner, SessionOwner::Ecg);
    let later_gsr = later.gsr.expect("GSR progress missing under ECG foreground");
    assert!(
        later_gsr.remaining_seconds < first_gsr.remaining_seconds,
        "GSR countdown {} -> {}",
        first_gsr.remaining_seconds,
        later_gsr.remaining_seconds
    );
    assert!(later_gsr.elapsed_seconds > first_gsr.elapsed_seconds);

    h.cancel();
    h.step(true, true);
    assert_eq!(h.svc.owner(), SessionOwner::Gsr);
    h.cancel();
    h.step(true, true);
    assert_eq!(h.svc.status().gsr, None);
}

#[test]
fn gsr_completion_and_ecg_timeout_in_same_poll_both_delivered() {
    // Poll times, relative to each session's start, at which the GSR session
    // completes and an ECG session without contact times out.
    let gsr_done = {
        let mut h = Harness::new();
        h.command(SessionCommand::StartGsr);
        h.run_while(40_000, false, true, |h| h.signals.contains(&SessionSignal::GsrComplete))
            .expect("GSR never completed")
    };
    let ecg_timeout = {
        let mut h = Harness::new();
        h.command(SessionCommand::StartEcg);
        h.run_while(20_000, false, true, |h| h.signals.contains(&SessionSignal::LeadTimeout))
            .expect("no lead timeout")
    };
    assert!(gsr_done > ecg_timeout);

    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.run_until(gsr_done - ecg_timeout, false, true);
    h.command(SessionCommand::StartEcg);

    let t = h
        .run_while(40_000, false, true, |h| !h.signals.is_empty())
        .expect("no signal raised");
    assert_eq!(t, gsr_done);
    assert_eq!(h.signals, [SessionSignal::GsrComplete, SessionSignal::LeadTimeout]);
}

#[test]
fn cancel_targets_foreground_then_gsr_regains_it() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartGsr);
    h.run_until(1_000, true, true);
    h.command(SessionCommand::StartEcg);
    h.step(true, true);
    assert_eq!(h.svc.owner(), SessionOwner::Ecg);

    h.cancel();
    h.step(true, true);
    assert_eq!(h.svc.ecg_session_state(), SessionState::Idle);
    assert_eq!(h.svc.gsr_state(), GsrState::Streaming);
    assert_eq!(h.svc.owner(), SessionOwner::Gsr);
    assert!(!h.afe.ecg_on);
    assert!(h.afe.bioz_on);

    h.cancel();
    h.step(true, true);
    assert_eq!(h.svc.owner(), SessionOwner::None);
    assert!(h.env.persisted.is_empty());
    assert!(!h.afe.bioz_on);
}

// ── Background GSR-signal recorder ────────────────────────────

#[test]
fn signal_recorder_keeps_bioz_on_after_ecg_session() {
    let mut h = Harness::new();
    h.env.gsr_signal_recording = true;
    h.command(SessionCommand::StartEcg);
    h.run_while(40_000, true, true, |h| h.signals.contains(&SessionSignal::EcgComplete))
        .expect("ECG never completed");

    assert_eq!(h.svc.owner(), SessionOwner::None);
    assert_eq!(h.svc.hardware_enabled(), (false, true));
    assert!(h.svc.sampler_running());
    assert_eq!(h.afe.calls, [AfeCall::EnableEcg, AfeCall::EnableBioz, AfeCall::DisableEcg]);

    h.run_until(h.now_ms + 2_000, true, true);
    assert!(h.afe.bioz_on);

    h.env.gsr_signal_recording = false;
    h.step(true, true);
    assert!(!h.afe.bioz_on);
    assert!(!h.svc.sampler_running());
    assert_eq!(h.sampler.last(), Some(&SamplerControl::Stop));
}

#[test]
fn signal_recorder_lease_skipped_when_setting_off() {
    let mut h = Harness::new();
    h.command(SessionCommand::StartEcg);
    h.run_while(20_000, false, false, |h| h.signals.contains(&SessionSignal::LeadTimeout))
        .expect("no lead timeout");
    assert_eq!(h.svc.hardware_enabled(), (false, false));
}
