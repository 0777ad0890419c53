//! Session service: the hexagonal core.
//!
//! [`SessionService`] owns both session machines and their shared
//! context.  It is polled from one dedicated thread at a fixed short
//! interval and never blocks.  All I/O flows through port traits and the
//! [`SessionLinks`] queues, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!           commands · cancel · inbox                    plot · signal · status
//!  links ─────────────────────────▶ ┌──────────────────┐ ─────────────────────▶ links
//!                                   │  SessionService   │
//!  SensorControlPort ◀──────────────│  ECG FSM · GSR FSM│──────────────▶ EventSink
//!  Settings · Store · HRV ◀─────────│  leases · effects │
//!                                   └──────────────────┘
//! ```
//!
//! One poll, in order:
//!
//! 1. cancel signal (applies to the foreground session)
//! 2. queued commands
//! 3. inbox: vitals, debouncers, buffers, live-plot forwarding
//! 4. ECG tick, then GSR tick
//! 5. effects: polarity latch, completion signals, HRV analysis, storage
//! 6. hardware and sampler reconciliation from the channel leases
//! 7. status publication

use log::{error, info, warn};

use crate::channels::{InboxMsg, SamplerControl, SessionLinks, post};
use crate::config::SystemConfig;
use crate::error::HwError;
use crate::fsm::context::{LastVitals, Recording, SessionContext, SessionEffect};
use crate::fsm::ecg_states::build_ecg_table;
use crate::fsm::gsr_states::build_gsr_table;
use crate::fsm::leases::{HwChannel, LeaseHolder};
use crate::fsm::{
    EcgFsm, EcgState, Fsm, GsrFsm, GsrState, SessionMode, SessionOwner, SessionState,
};
use crate::sensors::ContactState;

use super::commands::SessionCommand;
use super::events::{AppEvent, GsrProgress, SessionPath, SessionSignal, StatusSnapshot};
use super::ports::{EventSink, Hand, HrvAnalyzer, RecordingStore, SensorControlPort, SettingsPort};

// ───────────────────────────────────────────────────────────────
// SessionService
// ───────────────────────────────────────────────────────────────

pub struct SessionService {
    ecg: EcgFsm,
    gsr: GsrFsm,
    ctx: SessionContext,
    /// Foreground session; recomputed at the end of every poll.
    owner: SessionOwner,
    /// Channel state last applied to the AFE.
    ecg_enabled: bool,
    bioz_enabled: bool,
    sampler_running: bool,
    /// A hardware failure aborted sessions during the current poll.
    faulted: bool,
    last_status: Option<StatusSnapshot>,
    last_status_ms: u64,
    poll_count: u64,
}

impl SessionService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the machines: call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            ecg: Fsm::new("ECG", build_ecg_table(), EcgState::Idle),
            gsr: Fsm::new("GSR", build_gsr_table(), GsrState::Idle),
            ctx: SessionContext::new(config),
            owner: SessionOwner::None,
            ecg_enabled: false,
            bioz_enabled: false,
            sampler_running: false,
            faulted: false,
            last_status: None,
            last_status_ms: 0,
            poll_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.ecg.start(&mut self.ctx);
        self.gsr.start(&mut self.ctx);
        sink.emit(&AppEvent::Started);
        info!("SessionService started");
    }

    // ── Per-poll orchestration ────────────────────────────────

    /// Run one poll cycle.
    ///
    /// `env` satisfies all three collaborator ports at once, which keeps
    /// the call site free of a double mutable borrow.
    pub fn poll(
        &mut self,
        now_ms: u64,
        hw: &mut impl SensorControlPort,
        env: &mut (impl SettingsPort + RecordingStore + HrvAnalyzer),
        links: &SessionLinks,
        sink: &mut impl EventSink,
    ) {
        self.poll_count += 1;
        self.faulted = false;
        self.ctx.now_ms = now_ms;
        let before = (self.ecg_session_state(), self.gsr_session_state());
        let ecg_was_active = self.ecg.current_state() != EcgState::Idle;

        // 1. Cancel
        if links.cancel.try_take().is_some() {
            self.cancel();
        }

        // 2. Commands
        while let Ok(cmd) = links.commands.try_receive() {
            self.handle_command(cmd, sink);
        }

        // 3. Inbox
        while let Ok(msg) = links.inbox.try_receive() {
            match msg {
                InboxMsg::Batch(batch) => {
                    self.ctx.ingest(&batch);
                    post(&links.plot, batch, "plot");
                }
                InboxMsg::ReadFailed(e) => {
                    error!("AFE: burst read failed: {}", e);
                    self.abort_sessions(None, e, sink);
                }
            }
        }

        // 4. FSM ticks
        self.ecg.tick(&mut self.ctx);
        self.gsr.tick(&mut self.ctx);

        if ecg_was_active && self.ecg.current_state() == EcgState::Idle && !self.faulted {
            self.on_ecg_session_ended(&*env);
        }
        if self.ctx.leases.bioz.is_held_by(LeaseHolder::Background)
            && !env.is_gsr_signal_recording_enabled()
        {
            info!("GSR signal recorder disabled, releasing BioZ");
            self.ctx.leases.bioz.release(LeaseHolder::Background);
        }

        // 5. Effects
        for effect in self.ctx.take_effects() {
            match effect {
                SessionEffect::EcgArmed => {
                    let invert_ecg = env.lead_hand_orientation() == Hand::Right;
                    post(
                        &links.sampler,
                        SamplerControl::BeginEcgSession { invert_ecg },
                        "sampler",
                    );
                }
                SessionEffect::LeadTimeout => {
                    self.publish_signal(SessionSignal::LeadTimeout, links, sink);
                }
                SessionEffect::Completed(recording) => {
                    self.complete(&recording, env, links, sink);
                }
            }
        }

        // 6. Hardware + sampler
        self.reconcile_hardware(hw, sink);
        self.reconcile_sampler(links);

        // 7. Status
        self.owner = self.foreground();
        let after = (self.ecg_session_state(), self.gsr_session_state());
        if before.0 != after.0 {
            sink.emit(&AppEvent::StateChanged { path: SessionPath::Ecg, from: before.0, to: after.0 });
        }
        if before.1 != after.1 {
            sink.emit(&AppEvent::StateChanged { path: SessionPath::Gsr, from: before.1, to: after.1 });
        }
        self.publish_status(now_ms, links);
    }

    // ── Command handling ──────────────────────────────────────

    /// Arbitrate one start / buffer-full request.
    pub fn handle_command(&mut self, cmd: SessionCommand, sink: &mut impl EventSink) {
        match cmd {
            SessionCommand::StartEcg | SessionCommand::StartHrv => {
                let mode = if cmd == SessionCommand::StartHrv {
                    SessionMode::Hrv
                } else {
                    SessionMode::Ecg
                };
                if self.ecg.current_state() != EcgState::Idle || self.ctx.ecg.requested.is_some() {
                    self.reject(mode, sink);
                } else {
                    info!("Start {:?} accepted", mode);
                    self.ctx.ecg.requested = Some(mode);
                }
            }
            SessionCommand::StartGsr => {
                if self.gsr.current_state() != GsrState::Idle || self.ctx.gsr.requested {
                    self.reject(SessionMode::Gsr, sink);
                } else {
                    info!("Start Gsr accepted");
                    self.ctx.gsr.requested = true;
                }
            }
            SessionCommand::GsrBufferFull => {
                if self.gsr.current_state() == GsrState::Streaming {
                    self.ctx.gsr.buffer_full = true;
                } else {
                    warn!("GSR buffer-full ignored in {}", self.gsr.current_name());
                }
            }
        }
    }

    /// Cooperative cancel of the foreground session.  Observed by the
    /// next FSM tick; samples arriving in between are no longer buffered.
    pub fn cancel(&mut self) {
        match self.owner {
            SessionOwner::Ecg | SessionOwner::Hrv => {
                info!("Cancel requested for {:?}", self.owner);
                self.ctx.ecg.cancel_requested = true;
            }
            SessionOwner::Gsr => {
                info!("Cancel requested for Gsr");
                self.ctx.gsr.cancel_requested = true;
            }
            SessionOwner::None => info!("Cancel ignored, no session running"),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn owner(&self) -> SessionOwner {
        self.owner
    }

    pub fn ecg_state(&self) -> EcgState {
        self.ecg.current_state()
    }

    pub fn gsr_state(&self) -> GsrState {
        self.gsr.current_state()
    }

    /// Externally visible state of the ECG / HRV path.
    pub fn ecg_session_state(&self) -> SessionState {
        match self.ecg.current_state() {
            EcgState::Idle => SessionState::Idle,
            EcgState::WaitForContact => SessionState::WaitForContact,
            EcgState::Recording => SessionState::Recording { phase: self.ctx.ecg.phase },
        }
    }

    /// Externally visible state of the GSR path.
    pub fn gsr_session_state(&self) -> SessionState {
        match self.gsr.current_state() {
            GsrState::Idle => SessionState::Idle,
            GsrState::Entry => SessionState::GsrEntry,
            GsrState::Streaming => SessionState::GsrStreaming,
            GsrState::Complete => SessionState::GsrComplete,
        }
    }

    /// Last heart rate / RR / contact seen, sessions or not.
    pub fn vitals(&self) -> LastVitals {
        self.ctx.vitals
    }

    /// Channels the service has enabled on the AFE, `(ecg, bioz)`.
    pub fn hardware_enabled(&self) -> (bool, bool) {
        (self.ecg_enabled, self.bioz_enabled)
    }

    pub fn sampler_running(&self) -> bool {
        self.sampler_running
    }

    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    /// Build the status snapshot for the foreground session.
    pub fn status(&self) -> StatusSnapshot {
        let vitals = self.ctx.vitals;
        let mut snapshot = StatusSnapshot {
            owner: self.owner,
            heart_rate: vitals.heart_rate,
            rr_interval_ms: vitals.rr_interval_ms,
            gsr: self.gsr_progress(),
            ..StatusSnapshot::default()
        };

        match self.owner {
            SessionOwner::Ecg | SessionOwner::Hrv => {
                let s = &self.ctx.ecg;
                snapshot.state = self.ecg_session_state();
                snapshot.contact = s.contact.committed();
                if self.ecg.current_state() == EcgState::WaitForContact {
                    let waited = self.ctx.now_ms.saturating_sub(s.wait_started_ms) / 1000;
                    snapshot.remaining_seconds =
                        self.ctx.config.lead_timeout_secs.saturating_sub(waited as u16);
                } else {
                    snapshot.remaining_seconds = s.countdown.remaining_secs();
                    snapshot.elapsed_seconds = s.countdown.active_elapsed_secs();
                }
            }
            SessionOwner::Gsr => {
                if let Some(gsr) = snapshot.gsr {
                    snapshot.state = gsr.state;
                    snapshot.contact = gsr.contact;
                    snapshot.remaining_seconds = gsr.remaining_seconds;
                    snapshot.elapsed_seconds = gsr.elapsed_seconds;
                }
            }
            SessionOwner::None => {
                snapshot.contact = ContactState::from(vitals.ecg_contact);
            }
        }
        snapshot
    }

    // ── Internal ──────────────────────────────────────────────

    fn gsr_progress(&self) -> Option<GsrProgress> {
        if self.gsr.current_state() == GsrState::Idle {
            return None;
        }
        let s = &self.ctx.gsr;
        Some(GsrProgress {
            state: self.gsr_session_state(),
            contact: s.contact.committed(),
            remaining_seconds: s.countdown.remaining_secs(),
            elapsed_seconds: s.countdown.active_elapsed_secs(),
        })
    }

    fn foreground(&self) -> SessionOwner {
        if self.ecg.current_state() != EcgState::Idle {
            SessionOwner::from(self.ctx.ecg.mode)
        } else if self.gsr.current_state() != GsrState::Idle {
            SessionOwner::Gsr
        } else {
            SessionOwner::None
        }
    }

    fn reject(&self, requested: SessionMode, sink: &mut impl EventSink) {
        warn!("Start {:?} rejected, {:?} in progress", requested, self.owner);
        sink.emit(&AppEvent::SessionRejected { requested, owner: self.owner });
    }

    fn on_ecg_session_ended(&mut self, env: &impl SettingsPort) {
        if env.is_gsr_signal_recording_enabled()
            && !self.ctx.leases.bioz.is_held_by(LeaseHolder::Background)
        {
            info!("GSR signal recorder enabled, keeping BioZ on");
            self.ctx.leases.bioz.acquire(LeaseHolder::Background);
        }
    }

    fn complete(
        &mut self,
        recording: &Recording,
        env: &mut (impl RecordingStore + HrvAnalyzer),
        links: &SessionLinks,
        sink: &mut impl EventSink,
    ) {
        let signal = match recording.mode {
            SessionMode::Ecg => SessionSignal::EcgComplete,
            SessionMode::Hrv => {
                let result = env.analyze(&recording.rr_intervals);
                info!(
                    "HRV: {} intervals, mean RR {} ms",
                    result.interval_count, result.mean_rr_ms
                );
                SessionSignal::HrvComplete(result)
            }
            SessionMode::Gsr => SessionSignal::GsrComplete,
        };

        if let Err(e) = env.persist(recording) {
            warn!("Storage: {:?} recording not persisted: {}", recording.mode, e);
        }
        self.publish_signal(signal, links, sink);
    }

    fn publish_signal(&self, signal: SessionSignal, links: &SessionLinks, sink: &mut impl EventSink) {
        links.signals.publish(signal);
        sink.emit(&AppEvent::Signal(signal));
    }

    /// Drop every running session that holds a lease on `channel` (all
    /// sessions when `None`).  The forced Idle entry releases their leases;
    /// reconciliation then disables what is no longer wanted.
    fn abort_sessions(&mut self, channel: Option<HwChannel>, error: HwError, sink: &mut impl EventSink) {
        let leases = self.ctx.leases;
        let holds = |holder| channel.is_none_or(|c| leases.channel(c).is_held_by(holder));

        if self.ecg.current_state() != EcgState::Idle && holds(LeaseHolder::EcgSession) {
            let mode = self.ctx.ecg.mode;
            warn!("Aborting {:?} session: {}", mode, error);
            self.ctx.ecg.cancelled = true;
            self.ecg.force_transition(EcgState::Idle, &mut self.ctx);
            sink.emit(&AppEvent::SessionAborted { mode, error });
        }
        if self.gsr.current_state() != GsrState::Idle && holds(LeaseHolder::GsrSession) {
            warn!("Aborting Gsr session: {}", error);
            self.ctx.gsr.cancelled = true;
            self.gsr.force_transition(GsrState::Idle, &mut self.ctx);
            sink.emit(&AppEvent::SessionAborted { mode: SessionMode::Gsr, error });
        }
        if holds(LeaseHolder::Background) {
            self.ctx.leases.bioz.release(LeaseHolder::Background);
        }
        // Nothing that was aborted may be handed to storage.
        self.ctx.effects.retain(|e| !matches!(e, SessionEffect::Completed(_)));
        self.faulted = true;
    }

    fn reconcile_hardware(&mut self, hw: &mut impl SensorControlPort, sink: &mut impl EventSink) {
        // A failure releases leases, so a second pass disables whatever the
        // aborted sessions no longer need.
        for _ in 0..2 {
            let ecg_failed = self.apply_channel(HwChannel::Ecg, hw, sink);
            let bioz_failed = self.apply_channel(HwChannel::Bioz, hw, sink);
            if !ecg_failed && !bioz_failed {
                break;
            }
        }
    }

    /// Bring one channel in line with its lease.  Returns `true` on failure.
    fn apply_channel(
        &mut self,
        channel: HwChannel,
        hw: &mut impl SensorControlPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let wanted = self.ctx.leases.channel(channel).is_held();
        let enabled = match channel {
            HwChannel::Ecg => &mut self.ecg_enabled,
            HwChannel::Bioz => &mut self.bioz_enabled,
        };
        if wanted == *enabled {
            return false;
        }

        let result = match (channel, wanted) {
            (HwChannel::Ecg, true) => hw.enable_ecg(),
            (HwChannel::Ecg, false) => hw.disable_ecg(),
            (HwChannel::Bioz, true) => hw.enable_bioz(),
            (HwChannel::Bioz, false) => hw.disable_bioz(),
        };
        let action = if wanted { "enable" } else { "disable" };

        match result {
            Ok(()) => {
                *enabled = wanted;
                info!("AFE: {:?} {}d", channel, action);
                false
            }
            Err(e) => {
                error!("AFE: {:?} {} failed: {}", channel, action, e);
                // No retry: treat the channel as off either way.
                *enabled = false;
                if wanted {
                    if let Err(e) = Self::disable(channel, hw) {
                        error!("AFE: {:?} disable after failure also failed: {}", channel, e);
                    }
                }
                self.abort_sessions(Some(channel), e, sink);
                true
            }
        }
    }

    fn disable(channel: HwChannel, hw: &mut impl SensorControlPort) -> Result<(), HwError> {
        match channel {
            HwChannel::Ecg => hw.disable_ecg(),
            HwChannel::Bioz => hw.disable_bioz(),
        }
    }

    fn reconcile_sampler(&mut self, links: &SessionLinks) {
        let wanted = self.ctx.leases.any_held();
        if wanted == self.sampler_running {
            return;
        }
        let ctl = if wanted { SamplerControl::Start } else { SamplerControl::Stop };
        if post(&links.sampler, ctl, "sampler") {
            self.sampler_running = wanted;
        }
    }

    fn publish_status(&mut self, now_ms: u64, links: &SessionLinks) {
        let snapshot = self.status();
        let changed = self.last_status != Some(snapshot);
        let active = self.owner != SessionOwner::None;
        let due = active
            && now_ms.saturating_sub(self.last_status_ms)
                >= u64::from(self.ctx.config.status_interval_ms);
        let streaming = self.gsr.current_state() == GsrState::Streaming;

        if changed || due || streaming {
            links.status.signal(snapshot);
            self.last_status = Some(snapshot);
            self.last_status_ms = now_ms;
        }
    }
}
