//! Burst-read decoder.
//!
//! Wire format of one burst buffer:
//! ```text
//! ┌──────┬──────┬────────┬──────┬──────────┬──────────┬─────────────┬──────────────┐
//! │ n(1) │ m(1) │ stat(1)│ rsv  │ HR u16LE │ RR u16LE │ n × ECG rec │ m × BioZ rec │
//! └──────┴──────┴────────┴──────┴──────────┴──────────┴─────────────┴──────────────┘
//!   stat: bit0 ECG lead-off · bit1 BioZ lead-off · bit2 RR updated
//!
//!   record (4 B): [tag (bits 2..0)] [sample 23..16] [15..8] [7..0]
//! ```
//!
//! Tag `0b110` ends a channel's section early, `0b111` means the AFE FIFO
//! wrapped: decoding stops for the whole buffer and the caller must reset
//! and resynchronise the FIFO.  Every other tag is a valid sample.

use crate::config::SystemConfig;
use crate::error::DecodeError;

use super::smoothing::MovingAverage;
use super::{BATCH_CAPACITY, SampleBatch};

pub const HEADER_SIZE: usize = 8;
pub const RECORD_SIZE: usize = 4;

const STATUS_ECG_LEAD_OFF: u8 = 0b001;
const STATUS_BIOZ_LEAD_OFF: u8 = 0b010;
const STATUS_RR_UPDATED: u8 = 0b100;

const TAG_MASK: u8 = 0b111;

pub const TAG_VALID: u8 = 0b000;
pub const TAG_EMPTY: u8 = 0b110;
pub const TAG_OVERFLOW: u8 = 0b111;

/// Validity tag carried by every raw sample record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTag {
    Valid,
    /// The FIFO wrapped and samples were lost.
    Overflow,
    /// No more samples in this burst.
    Empty,
}

impl SampleTag {
    pub fn from_bits(bits: u8) -> Self {
        match bits & TAG_MASK {
            TAG_EMPTY => Self::Empty,
            TAG_OVERFLOW => Self::Overflow,
            // Unknown tags decode as data for forward compatibility.
            _ => Self::Valid,
        }
    }
}

/// Result of decoding one burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutput {
    pub batch: SampleBatch,
    /// An overflow tag was seen; issue FIFO reset + synchronise once.
    pub resync_required: bool,
}

/// Sign-extend a 24-bit two's-complement value held in the low bits.
pub fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

/// Stateful decoder: owns ECG smoothing and lead polarity.
pub struct SampleDecoder {
    smoothing_enabled: bool,
    smoother: MovingAverage,
    invert_ecg: bool,
}

impl SampleDecoder {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            smoothing_enabled: config.ecg_smoothing_enabled,
            smoother: MovingAverage::new(config.smoothing_window as usize),
            invert_ecg: false,
        }
    }

    /// Prepare for a fresh ECG session: forget smoothing history and latch
    /// lead polarity for the session's lifetime.
    pub fn begin_session(&mut self, invert_ecg: bool) {
        self.smoother.reset();
        self.invert_ecg = invert_ecg;
    }

    pub fn set_smoothing(&mut self, enabled: bool) {
        if enabled != self.smoothing_enabled {
            self.smoother.reset();
        }
        self.smoothing_enabled = enabled;
    }

    pub fn decode(&mut self, raw: &[u8], timestamp_ms: u64) -> Result<DecodeOutput, DecodeError> {
        if raw.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated { len: raw.len(), needed: HEADER_SIZE });
        }

        let ecg_count = raw[0] as usize;
        let bioz_count = raw[1] as usize;
        for claimed in [ecg_count, bioz_count] {
            if claimed > BATCH_CAPACITY {
                return Err(DecodeError::CountOverflow { claimed });
            }
        }

        let needed = HEADER_SIZE + (ecg_count + bioz_count) * RECORD_SIZE;
        if raw.len() < needed {
            return Err(DecodeError::Truncated { len: raw.len(), needed });
        }

        let status = raw[2];
        let mut batch = SampleBatch {
            timestamp_ms,
            ecg_lead_off: status & STATUS_ECG_LEAD_OFF != 0,
            bioz_lead_off: status & STATUS_BIOZ_LEAD_OFF != 0,
            rr_updated: status & STATUS_RR_UPDATED != 0,
            heart_rate: u16::from_le_bytes([raw[4], raw[5]]),
            rr_interval_ms: u16::from_le_bytes([raw[6], raw[7]]),
            ..SampleBatch::default()
        };

        let ecg_records = &raw[HEADER_SIZE..HEADER_SIZE + ecg_count * RECORD_SIZE];
        let bioz_records = &raw[HEADER_SIZE + ecg_count * RECORD_SIZE..needed];

        let mut overflowed = false;
        for record in ecg_records.chunks_exact(RECORD_SIZE) {
            match SampleTag::from_bits(record[0]) {
                SampleTag::Empty => break,
                SampleTag::Overflow => {
                    overflowed = true;
                    break;
                }
                SampleTag::Valid => {
                    let mut sample = Self::sample_value(record);
                    if self.invert_ecg {
                        sample = -sample;
                    }
                    if self.smoothing_enabled {
                        sample = self.smoother.push(sample);
                    }
                    // Capacity is guaranteed by the count check above.
                    let _ = batch.ecg.push(sample);
                }
            }
        }

        if !overflowed {
            for record in bioz_records.chunks_exact(RECORD_SIZE) {
                match SampleTag::from_bits(record[0]) {
                    SampleTag::Empty => break,
                    SampleTag::Overflow => {
                        overflowed = true;
                        break;
                    }
                    SampleTag::Valid => {
                        let _ = batch.bioz.push(Self::sample_value(record));
                    }
                }
            }
        }

        if overflowed {
            log::warn!(
                "decoder: FIFO overflow after {} ECG / {} BioZ samples, resync required",
                batch.ecg.len(),
                batch.bioz.len()
            );
        }

        Ok(DecodeOutput { batch, resync_required: overflowed })
    }

    fn sample_value(record: &[u8]) -> i32 {
        let raw = u32::from_be_bytes([0, record[1], record[2], record[3]]);
        sign_extend_24(raw)
    }
}

/// Assembles burst buffers in the AFE wire format.  Used by the simulated
/// front-end and by tests; records beyond [`BATCH_CAPACITY`] are dropped.
#[derive(Debug, Clone, Default)]
pub struct BurstBuilder {
    status: u8,
    heart_rate: u16,
    rr_interval_ms: u16,
    ecg: heapless::Vec<[u8; RECORD_SIZE], BATCH_CAPACITY>,
    bioz: heapless::Vec<[u8; RECORD_SIZE], BATCH_CAPACITY>,
}

impl BurstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lead_off(mut self, ecg: bool, bioz: bool) -> Self {
        self.status &= !(STATUS_ECG_LEAD_OFF | STATUS_BIOZ_LEAD_OFF);
        if ecg {
            self.status |= STATUS_ECG_LEAD_OFF;
        }
        if bioz {
            self.status |= STATUS_BIOZ_LEAD_OFF;
        }
        self
    }

    pub fn heart(mut self, heart_rate: u16, rr_interval_ms: u16, rr_updated: bool) -> Self {
        self.heart_rate = heart_rate;
        self.rr_interval_ms = rr_interval_ms;
        if rr_updated {
            self.status |= STATUS_RR_UPDATED;
        } else {
            self.status &= !STATUS_RR_UPDATED;
        }
        self
    }

    pub fn ecg(mut self, tag: u8, sample: i32) -> Self {
        let _ = self.ecg.push(encode_record(tag, sample));
        self
    }

    pub fn bioz(mut self, tag: u8, sample: i32) -> Self {
        let _ = self.bioz.push(encode_record(tag, sample));
        self
    }

    pub fn len(&self) -> usize {
        HEADER_SIZE + (self.ecg.len() + self.bioz.len()) * RECORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.ecg.is_empty() && self.bioz.is_empty()
    }

    /// Serialise into `out`.  Returns the number of bytes written, or
    /// `None` if `out` is too small.
    pub fn write(&self, out: &mut [u8]) -> Option<usize> {
        let total = self.len();
        if out.len() < total {
            return None;
        }
        out[0] = self.ecg.len() as u8;
        out[1] = self.bioz.len() as u8;
        out[2] = self.status;
        out[3] = 0;
        out[4..6].copy_from_slice(&self.heart_rate.to_le_bytes());
        out[6..8].copy_from_slice(&self.rr_interval_ms.to_le_bytes());
        for (i, record) in self.ecg.iter().chain(self.bioz.iter()).enumerate() {
            let at = HEADER_SIZE + i * RECORD_SIZE;
            out[at..at + RECORD_SIZE].copy_from_slice(record);
        }
        Some(total)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0; self.len()];
        let _ = self.write(&mut out);
        out
    }
}

fn encode_record(tag: u8, sample: i32) -> [u8; RECORD_SIZE] {
    let b = (sample as u32).to_be_bytes();
    [tag & TAG_MASK, b[1], b[2], b[3]]
}
