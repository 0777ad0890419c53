//! AFE sampling worker.
//!
//! Runs on its own core-pinned thread, separate from the 100 ms session
//! poll.  The worker owns the read half of the front-end and the
//! [`SampleDecoder`]; it never touches session state and talks to the
//! FSM only through [`SessionLinks`].
//!
//! ```text
//!  ┌─────────────────────────────────────────────────────────┐
//!  │  Sampler thread (Core 1)                                │
//!  │  ┌───────────────────────────────────────────────────┐  │
//!  │  │  futures_lite::block_on                           │  │
//!  │  │  ┌─────────────────────────────────────────────┐  │  │
//!  │  │  │  edge_executor::LocalExecutor                │  │  │
//!  │  │  │   stopped: await links.sampler (wake-on-send)│  │  │
//!  │  │  │   running: burst read every sample period ⏱  │  │  │
//!  │  │  └─────────────────────────────────────────────┘  │  │
//!  │  └───────────────────────────────────────────────────┘  │
//!  └─────────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;

use log::{error, info, warn};

use crate::adapters::time::MonotonicClock;
use crate::app::ports::SensorReadPort;
use crate::channels::{InboxMsg, SamplerControl, SessionLinks, post};
use crate::config::SystemConfig;
use crate::drivers::task_pin::{self, Core, TaskSpec};
use crate::error::{Error, HwError};
use crate::sensors::BATCH_CAPACITY;
use crate::sensors::decoder::{HEADER_SIZE, RECORD_SIZE, SampleDecoder};

/// Largest burst the AFE can produce: header plus both channels full.
pub const BURST_BUF_SIZE: usize = HEADER_SIZE + 2 * BATCH_CAPACITY * RECORD_SIZE;

/// Core 1 (APP_CPU), away from the radio stacks, above the session loop.
pub const SAMPLER_TASK: TaskSpec =
    TaskSpec { core: Core::App, priority: 10, stack_kb: 8, name: "afe-sampler\0" };

/// Running counters, logged when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub bursts: u32,
    pub decode_errors: u32,
    pub resyncs: u32,
}

pub struct SamplerWorker<R: SensorReadPort> {
    afe: R,
    decoder: SampleDecoder,
    running: bool,
    buf: [u8; BURST_BUF_SIZE],
    stats: SamplerStats,
}

impl<R: SensorReadPort> SamplerWorker<R> {
    pub fn new(afe: R, config: &SystemConfig) -> Self {
        Self {
            afe,
            decoder: SampleDecoder::new(config),
            running: false,
            buf: [0; BURST_BUF_SIZE],
            stats: SamplerStats::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    pub fn afe(&self) -> &R {
        &self.afe
    }

    pub fn apply(&mut self, ctl: SamplerControl) {
        match ctl {
            SamplerControl::Start if !self.running => {
                info!("Sampler: started");
                self.running = true;
            }
            SamplerControl::Stop if self.running => {
                info!(
                    "Sampler: stopped ({} bursts, {} decode errors, {} resyncs)",
                    self.stats.bursts, self.stats.decode_errors, self.stats.resyncs
                );
                self.running = false;
            }
            SamplerControl::Start | SamplerControl::Stop => {}
            SamplerControl::BeginEcgSession { invert_ecg } => {
                info!("Sampler: new ECG session (inverted={})", invert_ecg);
                self.decoder.begin_session(invert_ecg);
            }
        }
    }

    /// Apply pending control, then read and forward one burst if running.
    pub fn wake(&mut self, now_ms: u64, links: &SessionLinks) {
        while let Ok(ctl) = links.sampler.try_receive() {
            self.apply(ctl);
        }
        if !self.running {
            return;
        }

        if let Err(e) = self.read_burst(now_ms, links) {
            error!("Sampler: {}, stopping", e);
            self.running = false;
            post(&links.inbox, InboxMsg::ReadFailed(e), "inbox");
        }
    }

    fn read_burst(&mut self, now_ms: u64, links: &SessionLinks) -> Result<(), HwError> {
        let len = self.afe.burst_read(&mut self.buf)?;
        self.stats.bursts = self.stats.bursts.wrapping_add(1);

        let out = match self.decoder.decode(&self.buf[..len.min(BURST_BUF_SIZE)], now_ms) {
            Ok(out) => out,
            Err(e) => {
                warn!("Sampler: burst dropped: {}", e);
                self.stats.decode_errors = self.stats.decode_errors.wrapping_add(1);
                return Ok(());
            }
        };

        if out.resync_required {
            self.stats.resyncs = self.stats.resyncs.wrapping_add(1);
            self.afe.reset_fifo()?;
            self.afe.synchronize()?;
        }

        post(&links.inbox, InboxMsg::Batch(out.batch), "inbox");
        Ok(())
    }
}

// ── Async task ───────────────────────────────────────────────

/// Worker loop.  While stopped it parks on the control channel; while
/// running it reads one burst per sample period.
pub async fn run_sampler<R: SensorReadPort>(
    mut worker: SamplerWorker<R>,
    period: Duration,
    clock: MonotonicClock,
    links: &'static SessionLinks,
) {
    loop {
        if !worker.is_running() {
            let ctl = links.sampler.receive().await;
            worker.apply(ctl);
            continue;
        }
        worker.wake(clock.now_ms(), links);
        async_io_mini::Timer::after(period).await;
    }
}

// ── Thread spawn ─────────────────────────────────────────────

/// Spawn the sampling worker as [`SAMPLER_TASK`].
pub fn spawn_sampler<R>(
    afe: R,
    config: &SystemConfig,
    links: &'static SessionLinks,
) -> Result<std::thread::JoinHandle<()>, Error>
where
    R: SensorReadPort + Send + 'static,
{
    let worker = SamplerWorker::new(afe, config);
    let period = Duration::from_millis(u64::from(config.sample_period_ms));

    task_pin::spawn_on_core(&SAMPLER_TASK, move || {
        let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
        let clock = MonotonicClock::new();
        info!("Sampler task started (period {:?})", period);
        futures_lite::future::block_on(executor.run(run_sampler(worker, period, clock, links)));
    })
}
