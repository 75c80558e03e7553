//! `wadxl-core`
//!
//! Building blocks for turning a network-attached ADXL345 into a stream of
//! timestamped, calibrated acceleration samples.
//!
//! ## Pipeline
//!
//! - [`SampleBuffer`]: raw `(time, x, y, z)` tuples appended by the stream
//!   receiver and drained by the batch callback.
//! - [`AxisMap`]: compiled axis permutation, sign and scale; converts raw
//!   tuples to mm/s².
//! - [`BatchBulkHelper`]: periodic reader that fans converted batches out to
//!   registered clients.
//! - [`MeasurementCollector`]: per-measurement client that accumulates
//!   batches until finalized and can persist them as CSV.
//!
//! The network side lives in the `wadxl-driver` crate.

pub mod axes;
pub mod buffer;
pub mod bulk;
pub mod collector;
pub mod data;
pub mod error;
pub mod host;

pub use axes::{AxisMap, AxisSource, DEFAULT_AXES};
pub use buffer::{ErrorCounter, SampleBuffer};
pub use bulk::{BatchBulkHelper, BulkEndpoint, DEFAULT_BATCH_INTERVAL};
pub use collector::{write_samples_csv, MeasurementCollector, MAX_BATCHES};
pub use data::{AccelSample, RawSample, SampleBatch, SCALE_XY, SCALE_Z};
pub use error::{WadxlError, WadxlResult};
pub use host::{BatchClient, BatchSource, MotionClock};
