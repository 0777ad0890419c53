//! Mock adapters and a poll-by-poll harness for integration tests.
//!
//! Records every AFE control call and every event so tests can assert on
//! the full history without touching real hardware.  Batches are injected
//! straight into the inbox, standing in for the sampling worker.

use vitalband::app::commands::SessionCommand;
use vitalband::app::events::{AppEvent, HrvResult, SessionSignal, StatusSnapshot};
use vitalband::app::ports::{
    EventSink, Hand, HrvAnalyzer, RecordingStore, SensorControlPort, SettingsPort, StorageError,
};
use vitalband::app::service::SessionService;
use vitalband::channels::{InboxMsg, SamplerControl, SessionLinks};
use vitalband::config::SystemConfig;
use vitalband::error::HwError;
use vitalband::fsm::context::Recording;
use vitalband::sensors::SampleBatch;

// ── AFE control call record ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfeCall {
    EnableEcg,
    DisableEcg,
    EnableBioz,
    DisableBioz,
}

// ── MockAfe ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockAfe {
    pub calls: Vec<AfeCall>,
    /// Make the next call of this kind fail.
    pub fail_on: Option<AfeCall>,
    pub ecg_on: bool,
    pub bioz_on: bool,
}

#[allow(dead_code)]
impl MockAfe {
    pub fn count(&self, call: AfeCall) -> usize {
        self.calls.iter().filter(|&&c| c == call).count()
    }

    fn record(&mut self, call: AfeCall) -> Result<(), HwError> {
        self.calls.push(call);
        if self.fail_on == Some(call) {
            self.fail_on = None;
            return Err(HwError::NotResponding);
        }
        match call {
            AfeCall::EnableEcg => self.ecg_on = true,
            AfeCall::DisableEcg => self.ecg_on = false,
            AfeCall::EnableBioz => self.bioz_on = true,
            AfeCall::DisableBioz => self.bioz_on = false,
        }
        Ok(())
    }
}

impl SensorControlPort for MockAfe {
    fn enable_ecg(&mut self) -> Result<(), HwError> {
        self.record(AfeCall::EnableEcg)
    }

    fn disable_ecg(&mut self) -> Result<(), HwError> {
        self.record(AfeCall::DisableEcg)
    }

    fn enable_bioz(&mut self) -> Result<(), HwError> {
        self.record(AfeCall::EnableBioz)
    }

    fn disable_bioz(&mut self) -> Result<(), HwError> {
        self.record(AfeCall::DisableBioz)
    }
}

// ── MockEnv (settings + storage + HRV) ────────────────────────

#[derive(Default)]
pub struct MockEnv {
    pub hand: Hand,
    pub gsr_signal_recording: bool,
    pub persisted: Vec<Recording>,
    pub analyzed: Vec<Vec<u16>>,
}

impl SettingsPort for MockEnv {
    fn lead_hand_orientation(&self) -> Hand {
        self.hand
    }

    fn is_gsr_signal_recording_enabled(&self) -> bool {
        self.gsr_signal_recording
    }
}

impl RecordingStore for MockEnv {
    fn persist(&mut self, recording: &Recording) -> Result<(), StorageError> {
        self.persisted.push(recording.clone());
        Ok(())
    }
}

impl HrvAnalyzer for MockEnv {
    fn analyze(&mut self, rr_intervals_ms: &[u16]) -> HrvResult {
        self.analyzed.push(rr_intervals_ms.to_vec());
        HrvResult {
            interval_count: rr_intervals_ms.len() as u16,
            ..HrvResult::default()
        }
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// Drives one [`SessionService`] at the 100 ms poll cadence.
pub struct Harness {
    pub svc: SessionService,
    pub afe: MockAfe,
    pub env: MockEnv,
    pub sink: RecordingSink,
    pub links: SessionLinks,
    pub signals: Vec<SessionSignal>,
    pub sampler: Vec<SamplerControl>,
    pub now_ms: u64,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    pub fn with_config(config: SystemConfig) -> Self {
        let mut sink = RecordingSink::default();
        let mut svc = SessionService::new(config);
        svc.start(&mut sink);
        Self {
            svc,
            afe: MockAfe::default(),
            env: MockEnv::default(),
            sink,
            links: SessionLinks::new(),
            signals: Vec::new(),
            sampler: Vec::new(),
            now_ms: 0,
        }
    }

    pub fn command(&mut self, cmd: SessionCommand) {
        assert!(self.links.commands.try_send(cmd).is_ok(), "command queue full");
    }

    pub fn cancel(&mut self) {
        self.links.cancel.signal(());
    }

    /// Queue one batch as the sampler would, one sample per channel.
    pub fn feed(&mut self, ecg_contact: bool, bioz_contact: bool) {
        let t = self.now_ms;
        let mut batch = SampleBatch {
            timestamp_ms: t,
            ecg_lead_off: !ecg_contact,
            bioz_lead_off: !bioz_contact,
            heart_rate: 75,
            rr_interval_ms: 800,
            rr_updated: true,
            ..SampleBatch::default()
        };
        let _ = batch.ecg.push(t as i32);
        let _ = batch.bioz.push(-(t as i32));
        self.inject(InboxMsg::Batch(batch));
    }

    pub fn inject(&mut self, msg: InboxMsg) {
        assert!(self.links.inbox.try_send(msg).is_ok(), "inbox full");
    }

    /// Poll once at the current time, then advance 100 ms.
    pub fn poll(&mut self) {
        self.svc.poll(self.now_ms, &mut self.afe, &mut self.env, &self.links, &mut self.sink);
        self.signals.extend(self.links.signals.take_pending());
        while let Ok(ctl) = self.links.sampler.try_receive() {
            self.sampler.push(ctl);
        }
        while self.links.plot.try_receive().is_ok() {}
        self.now_ms += 100;
    }

    /// Feed a batch and poll.
    pub fn step(&mut self, ecg_contact: bool, bioz_contact: bool) {
        self.feed(ecg_contact, bioz_contact);
        self.poll();
    }

    /// Step with constant contact until `until_ms` (exclusive).
    pub fn run_until(&mut self, until_ms: u64, ecg_contact: bool, bioz_contact: bool) {
        while self.now_ms < until_ms {
            self.step(ecg_contact, bioz_contact);
        }
    }

    /// Step until `done` holds or `limit_ms` passes; returns the poll time
    /// at which `done` first held.
    pub fn run_while(
        &mut self,
        limit_ms: u64,
        ecg_contact: bool,
        bioz_contact: bool,
        mut done: impl FnMut(&Self) -> bool,
    ) -> Option<u64> {
        while self.now_ms < limit_ms {
            let t = self.now_ms;
            self.step(ecg_contact, bioz_contact);
            if done(self) {
                return Some(t);
            }
        }
        None
    }

    pub fn status(&self) -> Option<StatusSnapshot> {
        self.links.status.try_take()
    }

    pub fn rejections(&self) -> usize {
        self.sink
            .events
            .iter()
            .filter(|e| matches!(e, AppEvent::SessionRejected { .. }))
            .count()
    }
}
