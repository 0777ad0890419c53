//! In-RAM recording store.
//!
//! Completed recordings are postcard-encoded into a bounded ring of blobs.
//! When a new blob does not fit, the oldest blobs are evicted until it
//! does; the host sync drains the ring before that happens in practice.

use std::collections::VecDeque;

use log::{info, warn};

use crate::app::ports::{RecordingStore, StorageError};
use crate::fsm::context::Recording;

pub struct MemoryRecordingStore {
    capacity_bytes: usize,
    used_bytes: usize,
    blobs: VecDeque<Vec<u8>>,
    evicted: u32,
}

impl MemoryRecordingStore {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            used_bytes: 0,
            blobs: VecDeque::new(),
            evicted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Number of recordings dropped to make room.
    pub fn evicted(&self) -> u32 {
        self.evicted
    }

    /// Decode the stored recordings, oldest first.
    pub fn recordings(&self) -> Result<Vec<Recording>, StorageError> {
        self.blobs
            .iter()
            .map(|blob| postcard::from_bytes(blob).map_err(|_| StorageError::IoError))
            .collect()
    }

    /// Remove and return the oldest encoded recording.
    pub fn pop_oldest(&mut self) -> Option<Vec<u8>> {
        let blob = self.blobs.pop_front()?;
        self.used_bytes -= blob.len();
        Some(blob)
    }
}

impl RecordingStore for MemoryRecordingStore {
    fn persist(&mut self, recording: &Recording) -> Result<(), StorageError> {
        let blob = postcard::to_allocvec(recording).map_err(|_| StorageError::Encode)?;
        if blob.len() > self.capacity_bytes {
            warn!(
                "Store: {:?} recording ({} bytes) exceeds capacity {}",
                recording.mode,
                blob.len(),
                self.capacity_bytes
            );
            return Err(StorageError::Full);
        }

        while self.used_bytes + blob.len() > self.capacity_bytes {
            if self.pop_oldest().is_none() {
                break;
            }
            self.evicted = self.evicted.wrapping_add(1);
        }

        info!(
            "Store: {:?} recording persisted ({} ECG, {} BioZ, {} RR, {} bytes)",
            recording.mode,
            recording.ecg.len(),
            recording.bioz.len(),
            recording.rr_intervals.len(),
            blob.len()
        );
        self.used_bytes += blob.len();
        self.blobs.push_back(blob);
        Ok(())
    }
}
