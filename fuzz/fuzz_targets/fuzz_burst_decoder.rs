//! Fuzz target: `SampleDecoder::decode`
//!
//! Drives arbitrary byte sequences into the burst decoder and asserts that
//! it never panics, never yields more records than the header claims, and
//! keeps every raw sample inside the 24-bit range.
//!
//! cargo fuzz run fuzz_burst_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use vitalband::config::SystemConfig;
use vitalband::sensors::BATCH_CAPACITY;
use vitalband::sensors::decoder::SampleDecoder;

const SAMPLE_MIN: i32 = -(1 << 23);
const SAMPLE_MAX: i32 = (1 << 23) - 1;

fuzz_target!(|data: &[u8]| {
    let mut decoder = SampleDecoder::new(&SystemConfig::default());

    if let Ok(out) = decoder.decode(data, 0) {
        let batch = &out.batch;
        assert!(batch.ecg.len() <= BATCH_CAPACITY);
        assert!(batch.bioz.len() <= BATCH_CAPACITY);
        assert!(batch.ecg.len() <= usize::from(data[0]));
        assert!(batch.bioz.len() <= usize::from(data[1]));
        for &s in batch.ecg.iter().chain(batch.bioz.iter()) {
            assert!((SAMPLE_MIN..=SAMPLE_MAX).contains(&s), "sample {s} out of range");
        }
    }

    // Smoothing and inversion keep the same bounds on counts.
    decoder.set_smoothing(true);
    decoder.begin_session(true);
    if let Ok(out) = decoder.decode(data, 1) {
        assert!(out.batch.ecg.len() <= BATCH_CAPACITY);
        assert!(out.batch.bioz.len() <= BATCH_CAPACITY);
    }
});
