//! Minimal HRV analyzer.
//!
//! Reports interval count, mean RR and the heart rate it implies.  Full
//! time- and frequency-domain HRV metrics are computed off-device.

use crate::app::events::HrvResult;
use crate::app::ports::HrvAnalyzer;

#[derive(Debug, Default)]
pub struct SummaryHrvAnalyzer;

impl HrvAnalyzer for SummaryHrvAnalyzer {
    fn analyze(&mut self, rr_intervals_ms: &[u16]) -> HrvResult {
        let valid: Vec<u64> = rr_intervals_ms
            .iter()
            .filter(|&&rr| rr > 0)
            .map(|&rr| u64::from(rr))
            .collect();
        if valid.is_empty() {
            return HrvResult { interval_count: rr_intervals_ms.len() as u16, ..HrvResult::default() };
        }

        let mean_rr = valid.iter().sum::<u64>() / valid.len() as u64;
        HrvResult {
            interval_count: rr_intervals_ms.len() as u16,
            mean_rr_ms: mean_rr.min(u64::from(u16::MAX)) as u16,
            mean_heart_rate: (60_000 / mean_rr.max(1)) as u16,
        }
    }
}
