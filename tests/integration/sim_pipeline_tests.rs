//! End-to-end runs of the host pipeline: simulated AFE → sampling worker →
//! session service → in-RAM store, on a virtual clock.

use crate::mock_hw::RecordingSink;

use vitalband::adapters::env::SessionEnv;
use vitalband::adapters::hrv::SummaryHrvAnalyzer;
use vitalband::adapters::memory_store::MemoryRecordingStore;
use vitalband::adapters::settings::FixedSettings;
use vitalband::adapters::sim_afe::{SimAfeControl, SimAfeReader, SimulatedAfe};
use vitalband::app::commands::SessionCommand;
use vitalband::app::events::{AppEvent, SessionSignal};
use vitalband::app::service::SessionService;
use vitalband::channels::SessionLinks;
use vitalband::config::SystemConfig;
use vitalband::error::HwError;
use vitalband::fsm::{SessionMode, SessionOwner};
use vitalband::sampler::SamplerWorker;

/// Virtual clock resolution; divides both the poll and the sample period.
const TICK_MS: u64 = 25;

type Env = SessionEnv<FixedSettings, MemoryRecordingStore, SummaryHrvAnalyzer>;

struct Pipeline {
    afe: SimulatedAfe,
    control: SimAfeControl,
    worker: SamplerWorker<SimAfeReader>,
    svc: SessionService,
    env: Env,
    sink: RecordingSink,
    links: SessionLinks,
    signals: Vec<SessionSignal>,
    plotted: usize,
    now_ms: u64,
}

impl Pipeline {
    fn new() -> Self {
        let config = SystemConfig::default();
        let afe = SimulatedAfe::new();
        let control = afe.control();
        let worker = SamplerWorker::new(afe.reader(config.sample_period_ms), &config);
        let mut sink = RecordingSink::default();
        let mut svc = SessionService::new(config);
        svc.start(&mut sink);
        Self {
            afe,
            control,
            worker,
            svc,
            env: SessionEnv::new(
                FixedSettings::default(),
                MemoryRecordingStore::new(96 * 1024),
                SummaryHrvAnalyzer,
            ),
            sink,
            links: SessionLinks::new(),
            signals: Vec::new(),
            plotted: 0,
            now_ms: 0,
        }
    }

    fn command(&self, cmd: SessionCommand) {
        assert!(self.links.commands.try_send(cmd).is_ok(), "command queue full");
    }

    fn tick(&mut self) {
        let t = self.now_ms;
        let config = self.svc.config();
        if t % u64::from(config.sample_period_ms) == 0 && t > 0 {
            self.worker.wake(t, &self.links);
        }
        if t % u64::from(config.poll_interval_ms) == 0 {
            self.svc.poll(t, &mut self.control, &mut self.env, &self.links, &mut self.sink);
            self.signals.extend(self.links.signals.take_pending());
            while self.links.plot.try_receive().is_ok() {
                self.plotted += 1;
            }
        }
        self.now_ms += TICK_MS;
    }

    fn run_until(&mut self, limit_ms: u64, mut done: impl FnMut(&Self) -> bool) -> bool {
        while self.now_ms < limit_ms {
            self.tick();
            if done(self) {
                return true;
            }
        }
        false
    }
}

#[test]
fn simulated_ecg_session_records_thirty_seconds() {
    let mut p = Pipeline::new();
    p.command(SessionCommand::StartEcg);

    let completed = p.run_until(45_000, |p| p.signals.contains(&SessionSignal::EcgComplete));
    assert!(completed, "ECG session never completed");

    // Settle one more poll so the hardware is released.
    p.run_until(p.now_ms + 200, |_| false);
    assert_eq!(p.svc.owner(), SessionOwner::None);
    assert_eq!(p.afe.enabled(), (false, false));
    assert!(!p.worker.is_running());
    assert!(p.plotted > 0);

    let recs = p.env.store.recordings().expect("stored recordings decode");
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].mode, SessionMode::Ecg);
    // 128 sps for 30 s, give or take one burst at either edge.
    let n = recs[0].ecg.len();
    assert!((3_700..=3_900).contains(&n), "stored {n} ECG samples");
    assert_eq!(p.worker.stats().decode_errors, 0);
}

#[test]
fn simulated_hrv_session_reports_heart_rate() {
    let mut p = Pipeline::new();
    p.command(SessionCommand::StartHrv);

    let completed = p.run_until(80_000, |p| {
        p.signals.iter().any(|s| matches!(s, SessionSignal::HrvComplete(_)))
    });
    assert!(completed, "HRV session never completed");

    let Some(SessionSignal::HrvComplete(result)) = p.signals.last().copied() else {
        panic!("last signal was not an HRV result");
    };
    // 72 bpm → a beat every 106 samples → 828 ms.
    assert_eq!(result.mean_rr_ms, 828);
    assert_eq!(result.mean_heart_rate, 72);
    assert!((65..=75).contains(&result.interval_count), "{} intervals", result.interval_count);

    let recs = p.env.store.recordings().expect("stored recordings decode");
    assert_eq!(recs[0].mode, SessionMode::Hrv);
    assert_eq!(recs[0].rr_intervals.len(), usize::from(result.interval_count));
}

#[test]
fn simulated_lead_loss_times_out() {
    let mut p = Pipeline::new();
    p.afe.set_contact(false, false);
    p.command(SessionCommand::StartEcg);

    let timed_out = p.run_until(20_000, |p| p.signals.contains(&SessionSignal::LeadTimeout));
    assert!(timed_out, "no lead timeout");
    assert!(p.env.store.is_empty());
}

#[test]
fn simulated_read_failure_aborts_session() {
    let mut p = Pipeline::new();
    p.command(SessionCommand::StartGsr);
    p.run_until(3_000, |_| false);
    assert_eq!(p.svc.owner(), SessionOwner::Gsr);

    p.afe.set_read_failure(true);
    p.run_until(p.now_ms + 500, |_| false);

    assert_eq!(p.svc.owner(), SessionOwner::None);
    assert!(!p.worker.is_running());
    assert_eq!(p.afe.enabled(), (false, false));
    assert!(p.sink.events.contains(&AppEvent::SessionAborted {
        mode: SessionMode::Gsr,
        error: HwError::NotResponding,
    }));
    assert!(p.env.store.is_empty());
}
