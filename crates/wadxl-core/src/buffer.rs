//! Staging area between the stream receiver and the batch callback.
//!
//! The receiver appends raw samples; the periodic batch callback drains them.
//! Both sides take the same lock, and only for the copy itself. The lock is
//! never held across network or disk I/O.

use crate::data::RawSample;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Append/drain store for raw samples.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Mutex<Vec<RawSample>>,
}

impl SampleBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample.
    pub fn append(&self, sample: RawSample) {
        self.samples.lock().push(sample);
    }

    /// Append every sample of a parsed frame under a single lock.
    pub fn extend(&self, samples: impl IntoIterator<Item = RawSample>) {
        self.samples.lock().extend(samples);
    }

    /// Take everything appended since the last drain.
    ///
    /// An empty buffer yields an empty `Vec` without allocating.
    pub fn drain_all(&self) -> Vec<RawSample> {
        let mut samples = self.samples.lock();
        if samples.is_empty() {
            return Vec::new();
        }
        std::mem::take(&mut *samples)
    }

    /// Discard any buffered samples.
    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    /// Number of samples waiting to be drained.
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// Whether no samples are waiting.
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

/// Per-session count of transport and parse errors.
#[derive(Debug, Default)]
pub struct ErrorCounter(AtomicU32);

impl ErrorCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one error, returning the new total.
    pub fn increment(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }

    /// Current total.
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Reset at session start.
    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}
