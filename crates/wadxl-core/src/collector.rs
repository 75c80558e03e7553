//! Per-measurement accumulation of sample batches.
//!
//! A [`MeasurementCollector`] is registered with the batch facility and
//! receives every batch until it is finalized. Memory is bounded by a cap on
//! the number of stored batches; batches past the cap are dropped silently.

use crate::data::{AccelSample, SampleBatch};
use crate::error::WadxlResult;
use crate::host::{BatchClient, MotionClock};
use parking_lot::Mutex;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Maximum number of batches (not samples) a collector keeps.
pub const MAX_BATCHES: usize = 10_000;

/// Header row of the persisted CSV file.
pub const CSV_HEADER: [&str; 4] = ["#time", "accel_x", "accel_y", "accel_z"];

#[derive(Debug, Default)]
struct CollectorState {
    batches: Vec<SampleBatch>,
    end_time: Option<f64>,
    finished: bool,
    samples: Option<Arc<[AccelSample]>>,
}

/// Accumulates batches delivered during one measurement window.
pub struct MeasurementCollector {
    clock: Arc<dyn MotionClock>,
    start_time: f64,
    state: Mutex<CollectorState>,
}

impl std::fmt::Debug for MeasurementCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MeasurementCollector")
            .field("start_time", &self.start_time)
            .field("end_time", &state.end_time)
            .field("finished", &state.finished)
            .field("batches", &state.batches.len())
            .finish()
    }
}

impl MeasurementCollector {
    /// Open a collector whose window starts at the current motion time.
    pub fn new(clock: Arc<dyn MotionClock>) -> Arc<Self> {
        let start_time = clock.last_move_time();
        Arc::new(Self {
            clock,
            start_time,
            state: Mutex::new(CollectorState::default()),
        })
    }

    /// Start of the request window.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// End of the request window; equals the start until finalized.
    pub fn end_time(&self) -> f64 {
        self.state.lock().end_time.unwrap_or(self.start_time)
    }

    /// Whether [`finalize`](Self::finalize) has completed.
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Number of stored batches.
    pub fn batch_count(&self) -> usize {
        self.state.lock().batches.len()
    }

    /// Store one batch unless finalized or full.
    pub fn accept_batch(&self, batch: &SampleBatch) -> bool {
        let mut state = self.state.lock();
        if state.finished || state.batches.len() >= MAX_BATCHES {
            return false;
        }
        state.batches.push(batch.clone());
        state.samples = None;
        true
    }

    /// Close the measurement window.
    ///
    /// Fixes the end time, waits for in-flight motion so samples taken
    /// during those moves still arrive, then stops accepting batches. Only
    /// the first call has any effect.
    pub async fn finalize(&self) {
        {
            let mut state = self.state.lock();
            if state.end_time.is_some() {
                return;
            }
            state.end_time = Some(self.clock.last_move_time());
        }
        self.clock.wait_moves().await;
        self.state.lock().finished = true;
    }

    /// Whether the stored batches are usable for the request window.
    ///
    /// Always `true`. Sample times come from the peripheral clock while the
    /// window is host motion time, so a batch outside the window is logged
    /// rather than rejected.
    pub fn has_valid_samples(&self) -> bool {
        let state = self.state.lock();
        let end_time = state.end_time.unwrap_or(self.start_time);
        let mut spans = state
            .batches
            .iter()
            .filter_map(SampleBatch::time_span)
            .peekable();
        if spans.peek().is_some()
            && !spans.any(|(first, last)| first <= end_time && last >= self.start_time)
        {
            tracing::debug!(
                start_time = self.start_time,
                end_time,
                "No stored batch overlaps the request window"
            );
        }
        true
    }

    /// All stored samples, flattened in arrival order.
    ///
    /// The flattened list is cached until another batch is accepted.
    pub fn materialize_samples(&self) -> Arc<[AccelSample]> {
        let mut state = self.state.lock();
        if let Some(samples) = &state.samples {
            return samples.clone();
        }
        let total = state.batches.iter().map(|b| b.data.len()).sum();
        let mut flat = Vec::with_capacity(total);
        for batch in &state.batches {
            flat.extend_from_slice(&batch.data);
        }
        let samples: Arc<[AccelSample]> = flat.into();
        state.samples = Some(samples.clone());
        samples
    }

    /// Write the samples to `path` as CSV on a blocking worker.
    ///
    /// Returns immediately. The file may not exist yet when this returns;
    /// await the handle to observe completion. Must be called from within a
    /// Tokio runtime.
    pub fn write_to_file(&self, path: impl Into<PathBuf>) -> JoinHandle<WadxlResult<PathBuf>> {
        let path = path.into();
        let samples = self.materialize_samples();
        tokio::task::spawn_blocking(move || {
            write_samples_csv(&path, &samples)?;
            tracing::debug!(path = %path.display(), samples = samples.len(), "Wrote accelerometer CSV");
            Ok(path)
        })
    }
}

impl BatchClient for MeasurementCollector {
    fn handle_batch(&self, batch: &SampleBatch) -> bool {
        self.accept_batch(batch)
    }
}

/// Write samples as `#time,accel_x,accel_y,accel_z` rows with 6 decimals.
pub fn write_samples_csv(path: &Path, samples: &[AccelSample]) -> WadxlResult<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    writer.write_record(CSV_HEADER)?;
    for sample in samples {
        writer.write_record([
            format!("{:.6}", sample.time),
            format!("{:.6}", sample.accel_x),
            format!("{:.6}", sample.accel_y),
            format!("{:.6}", sample.accel_z),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Clock whose time advances by one second on every read.
    #[derive(Default)]
    struct StepClock {
        reads: AtomicUsize,
        waits: AtomicUsize,
    }

    #[async_trait]
    impl MotionClock for StepClock {
        fn last_move_time(&self) -> f64 {
            self.reads.fetch_add(1, Ordering::SeqCst) as f64
        }

        async fn wait_moves(&self) {
            self.waits.fetch_add(1, Ordering::SeqCst);
        }

        async fn dwell(&self, _seconds: f64) {}
    }

    fn batch(times: &[f64]) -> SampleBatch {
        SampleBatch {
            data: times
                .iter()
                .map(|&t| AccelSample::new(t, t, -t, 0.0))
                .collect(),
            errors: 0,
            overflows: 0,
        }
    }

    #[test]
    fn test_batch_cap() {
        let collector = MeasurementCollector::new(Arc::new(StepClock::default()));
        for i in 0..MAX_BATCHES {
            assert!(collector.accept_batch(&batch(&[i as f64])));
        }
        assert!(!collector.accept_batch(&batch(&[-1.0])));
        assert!(!collector.is_finished());

        let samples = collector.materialize_samples();
        assert_eq!(samples.len(), MAX_BATCHES);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.time, i as f64);
        }
    }

    #[tokio::test]
    async fn test_finalize_is_idempotent() {
        let clock = Arc::new(StepClock::default());
        let collector = MeasurementCollector::new(clock.clone());
        assert_eq!(collector.start_time(), 0.0);

        collector.finalize().await;
        let end_time = collector.end_time();
        assert_eq!(end_time, 1.0);
        assert!(collector.is_finished());

        collector.finalize().await;
        assert_eq!(collector.end_time(), end_time);
        assert_eq!(clock.waits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejects_after_finalize() {
        let collector = MeasurementCollector::new(Arc::new(StepClock::default()));
        assert!(collector.handle_batch(&batch(&[0.5])));
        collector.finalize().await;
        assert!(!collector.handle_batch(&batch(&[0.7])));
        assert_eq!(collector.batch_count(), 1);
    }

    #[tokio::test]
    async fn test_has_valid_samples() {
        // Window is [0, 1]
        let collector = MeasurementCollector::new(Arc::new(StepClock::default()));
        assert!(collector.has_valid_samples());
        assert!(collector.accept_batch(&SampleBatch::default()));
        assert!(collector.has_valid_samples());

        // Peripheral time far outside the host window still counts
        assert!(collector.accept_batch(&batch(&[3600.0, 3600.1])));
        collector.finalize().await;
        assert!(collector.has_valid_samples());

        let collector = MeasurementCollector::new(Arc::new(StepClock::default()));
        assert!(collector.accept_batch(&batch(&[-2.0, 0.5])));
        collector.finalize().await;
        assert!(collector.has_valid_samples());
    }

    #[test]
    fn test_materialize_is_cached_until_next_batch() {
        let collector = MeasurementCollector::new(Arc::new(StepClock::default()));
        collector.accept_batch(&batch(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        collector.accept_batch(&batch(&[6.0, 7.0]));

        let first = collector.materialize_samples();
        let second = collector.materialize_samples();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 7);

        collector.accept_batch(&batch(&[8.0]));
        assert_eq!(collector.materialize_samples().len(), 8);
    }

    #[tokio::test]
    async fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wadxl-test.csv");

        let collector = MeasurementCollector::new(Arc::new(StepClock::default()));
        collector.accept_batch(&SampleBatch {
            data: vec![
                AccelSample::new(1.0, -20.0, 10.0, 30.0),
                AccelSample::new(1.001, 0.1234567, 0.0, -9806.65),
            ],
            errors: 0,
            overflows: 0,
        });
        collector.finalize().await;

        let written = collector.write_to_file(&path).await.unwrap().unwrap();
        assert_eq!(written, path);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "#time,accel_x,accel_y,accel_z",
                "1.000000,-20.000000,10.000000,30.000000",
                "1.001000,0.123457,0.000000,-9806.650000",
            ]
        );
    }
}
