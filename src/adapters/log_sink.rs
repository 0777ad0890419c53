//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A companion-app telemetry adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::{AppEvent, SessionSignal};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => info!("START | session service ready"),
            AppEvent::StateChanged { path, from, to } => {
                info!("STATE | {:?} | {:?} -> {:?}", path, from, to);
            }
            AppEvent::SessionRejected { requested, owner } => {
                warn!("REJECT | start {:?} while {:?} in progress", requested, owner);
            }
            AppEvent::SessionAborted { mode, error } => {
                warn!("ABORT | {:?} session: {}", mode, error);
            }
            AppEvent::Signal(SessionSignal::HrvComplete(hrv)) => {
                info!(
                    "DONE | HRV | intervals={} mean_rr={}ms mean_hr={}bpm",
                    hrv.interval_count, hrv.mean_rr_ms, hrv.mean_heart_rate
                );
            }
            AppEvent::Signal(signal) => info!("SIGNAL | {:?}", signal),
        }
    }
}
