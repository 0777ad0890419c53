//! VitalBand Firmware: Main Entry Point
//!
//! Hexagonal architecture: a 100 ms session loop on the main task and a
//! core-pinned AFE sampling task, linked only by message queues.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimAfeControl     LogEventSink   NvsConfigStore  Monotonic    │
//! │  (SensorControl)   (EventSink)    (ConfigPort)    Clock        │
//! │  FixedSettings · MemoryRecordingStore · SummaryHrvAnalyzer     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           SessionService (pure logic)                  │    │
//! │  │  ECG/HRV FSM · GSR FSM · leases · effects              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                           ▲ SessionLinks ▼                     │
//! │  SamplerWorker (Core 1)  ·  display task (consumes links)      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use vitalband::adapters::env::SessionEnv;
use vitalband::adapters::hrv::SummaryHrvAnalyzer;
use vitalband::adapters::log_sink::LogEventSink;
use vitalband::adapters::memory_store::MemoryRecordingStore;
use vitalband::adapters::nvs::NvsConfigStore;
use vitalband::adapters::settings::FixedSettings;
use vitalband::adapters::sim_afe::SimulatedAfe;
use vitalband::adapters::time::MonotonicClock;
use vitalband::app::ports::{ConfigError, ConfigPort};
use vitalband::app::service::SessionService;
use vitalband::channels::SessionLinks;
use vitalband::config::SystemConfig;
use vitalband::sampler;

/// Every cross-task queue, shared with the sampler and the display task.
static LINKS: SessionLinks = SessionLinks::new();

/// RAM budget for completed recordings awaiting sync.
const RECORDING_STORE_BYTES: usize = 96 * 1024;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  VitalBand v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsConfigStore::new() {
        Ok(nvs) => match nvs.load() {
            Ok(cfg) => {
                info!("Config loaded from NVS");
                cfg
            }
            Err(ConfigError::NotFound) => {
                info!("No stored config, using defaults");
                SystemConfig::default()
            }
            Err(e) => {
                warn!("NVS config load failed ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Front-end + sampling task ──────────────────────────
    // The simulated front-end sits behind the same control and read ports
    // a register-level AFE driver would implement.
    let afe = SimulatedAfe::new();
    let mut afe_control = afe.control();
    let _sampler = sampler::spawn_sampler(afe.reader(config.sample_period_ms), &config, &LINKS)?;

    // ── 4. Session service ────────────────────────────────────
    let mut env = SessionEnv::new(
        FixedSettings::default(),
        MemoryRecordingStore::new(RECORDING_STORE_BYTES),
        SummaryHrvAnalyzer,
    );
    let mut log_sink = LogEventSink::new();
    let clock = MonotonicClock::new();
    let poll_interval = Duration::from_millis(u64::from(config.poll_interval_ms));

    let mut service = SessionService::new(config);
    service.start(&mut log_sink);

    info!("System ready. Entering session loop.");

    // ── 5. Session loop ───────────────────────────────────────
    loop {
        service.poll(clock.now_ms(), &mut afe_control, &mut env, &LINKS, &mut log_sink);
        std::thread::sleep(poll_interval);
    }
}
