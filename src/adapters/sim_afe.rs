//! Simulated analog front-end.
//!
//! Produces bursts in the real AFE wire format from a synthetic heartbeat
//! and a slowly drifting skin impedance.  The control half (FSM thread) and
//! the read half (sampler thread) share state through atomics, so the two
//! can live on different threads exactly like the real split driver.
//!
//! ```text
//!   SimulatedAfe ──control()──▶ SimAfeControl  (SensorControlPort)
//!        │
//!        └──────reader()──────▶ SimAfeReader   (SensorReadPort)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::app::ports::{SensorControlPort, SensorReadPort};
use crate::error::HwError;
use crate::sensors::BATCH_CAPACITY;
use crate::sensors::decoder::{BurstBuilder, TAG_VALID};

/// ECG samples per second.
const ECG_RATE: u32 = 128;
/// BioZ samples per second.
const BIOZ_RATE: u32 = 32;
const R_PEAK: i32 = 24_000;
const BIOZ_BASELINE: i32 = 520_000;

#[derive(Debug)]
struct SimState {
    ecg_enabled: AtomicBool,
    bioz_enabled: AtomicBool,
    ecg_contact: AtomicBool,
    bioz_contact: AtomicBool,
    heart_rate: AtomicU16,
    fail_reads: AtomicBool,
    fifo_resets: AtomicU32,
}

/// Handle used to steer the simulation (contact, heart rate, faults).
#[derive(Debug, Clone)]
pub struct SimulatedAfe {
    state: Arc<SimState>,
}

impl Default for SimulatedAfe {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAfe {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SimState {
                ecg_enabled: AtomicBool::new(false),
                bioz_enabled: AtomicBool::new(false),
                ecg_contact: AtomicBool::new(true),
                bioz_contact: AtomicBool::new(true),
                heart_rate: AtomicU16::new(72),
                fail_reads: AtomicBool::new(false),
                fifo_resets: AtomicU32::new(0),
            }),
        }
    }

    pub fn control(&self) -> SimAfeControl {
        SimAfeControl { state: Arc::clone(&self.state) }
    }

    /// `period_ms` is the sampler wake period; each read returns that much
    /// signal.
    pub fn reader(&self, period_ms: u32) -> SimAfeReader {
        SimAfeReader {
            state: Arc::clone(&self.state),
            period_ms,
            ecg_index: 0,
            bioz_index: 0,
            samples_since_beat: 0,
        }
    }

    pub fn set_contact(&self, ecg: bool, bioz: bool) {
        self.state.ecg_contact.store(ecg, Ordering::Relaxed);
        self.state.bioz_contact.store(bioz, Ordering::Relaxed);
    }

    pub fn set_heart_rate(&self, bpm: u16) {
        self.state.heart_rate.store(bpm.clamp(30, 220), Ordering::Relaxed);
    }

    pub fn set_read_failure(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::Relaxed);
    }

    /// Channels currently powered, `(ecg, bioz)`.
    pub fn enabled(&self) -> (bool, bool) {
        (
            self.state.ecg_enabled.load(Ordering::Relaxed),
            self.state.bioz_enabled.load(Ordering::Relaxed),
        )
    }

    pub fn fifo_resets(&self) -> u32 {
        self.state.fifo_resets.load(Ordering::Relaxed)
    }
}

// ── Control half ─────────────────────────────────────────────

pub struct SimAfeControl {
    state: Arc<SimState>,
}

impl SensorControlPort for SimAfeControl {
    fn enable_ecg(&mut self) -> Result<(), HwError> {
        self.state.ecg_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn disable_ecg(&mut self) -> Result<(), HwError> {
        self.state.ecg_enabled.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn enable_bioz(&mut self) -> Result<(), HwError> {
        self.state.bioz_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn disable_bioz(&mut self) -> Result<(), HwError> {
        self.state.bioz_enabled.store(false, Ordering::Relaxed);
        Ok(())
    }
}

// ── Read half ────────────────────────────────────────────────

pub struct SimAfeReader {
    state: Arc<SimState>,
    period_ms: u32,
    ecg_index: u32,
    bioz_index: u32,
    samples_since_beat: u32,
}

impl SimAfeReader {
    /// One ECG sample; returns the RR interval when a beat lands on it.
    fn next_ecg(&mut self, samples_per_beat: u32) -> (i32, Option<u16>) {
        self.ecg_index = self.ecg_index.wrapping_add(1);
        self.samples_since_beat += 1;
        if self.samples_since_beat >= samples_per_beat {
            let rr_ms = self.samples_since_beat * 1000 / ECG_RATE;
            self.samples_since_beat = 0;
            return (R_PEAK, Some(rr_ms as u16));
        }
        // Low-amplitude baseline wander between beats.
        let wander = (self.ecg_index % 64) as i32 - 32;
        (wander * 8, None)
    }

    fn next_bioz(&mut self) -> i32 {
        self.bioz_index = self.bioz_index.wrapping_add(1);
        let drift = (self.bioz_index % 256) as i32 - 128;
        BIOZ_BASELINE + drift * 16
    }
}

/// Samples one read carries on a channel, capped at what one burst holds.
fn samples_per_read(rate: u32, period_ms: u32) -> u32 {
    (rate * period_ms / 1000).min(BATCH_CAPACITY as u32)
}

impl SensorReadPort for SimAfeReader {
    fn burst_read(&mut self, buf: &mut [u8]) -> Result<usize, HwError> {
        let s = &*self.state;
        if s.fail_reads.load(Ordering::Relaxed) {
            return Err(HwError::NotResponding);
        }
        let heart_rate = s.heart_rate.load(Ordering::Relaxed);
        let ecg_enabled = s.ecg_enabled.load(Ordering::Relaxed);
        let bioz_enabled = s.bioz_enabled.load(Ordering::Relaxed);
        let (ecg_lead_off, bioz_lead_off) = (
            !s.ecg_contact.load(Ordering::Relaxed),
            !s.bioz_contact.load(Ordering::Relaxed),
        );

        let samples_per_beat = ECG_RATE * 60 / u32::from(heart_rate.max(1));
        let mut burst = BurstBuilder::new().lead_off(ecg_lead_off, bioz_lead_off);

        let mut last_rr = None;
        if ecg_enabled {
            for _ in 0..samples_per_read(ECG_RATE, self.period_ms) {
                let (sample, rr) = self.next_ecg(samples_per_beat);
                last_rr = rr.or(last_rr);
                burst = burst.ecg(TAG_VALID, sample);
            }
        }
        if bioz_enabled {
            for _ in 0..samples_per_read(BIOZ_RATE, self.period_ms) {
                let sample = self.next_bioz();
                burst = burst.bioz(TAG_VALID, sample);
            }
        }

        let rr = last_rr.unwrap_or((60_000 / u32::from(heart_rate.max(1))) as u16);
        burst = burst.heart(heart_rate, rr, last_rr.is_some());
        burst.write(buf).ok_or(HwError::Bus)
    }

    fn reset_fifo(&mut self) -> Result<(), HwError> {
        self.state.fifo_resets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), HwError> {
        self.samples_since_beat = 0;
        Ok(())
    }
}
