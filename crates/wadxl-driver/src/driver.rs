//! Wireless ADXL345 driver.
//!
//! Ties the [`NetworkSession`] to the batch pipeline:
//!
//! - the session's receive task fills the [`SampleBuffer`];
//! - the [`BatchBulkHelper`] calls [`BatchSource::process_batch`] every
//!   `batch_interval_ms`, which drains the buffer and converts the samples
//!   through the configured [`AxisMap`];
//! - each measurement is a [`MeasurementCollector`] registered as a batch
//!   client via [`WirelessAdxl345::start_internal_client`].
//!
//! Streaming starts when the first collector registers and stops once the
//! last one has been finalized and declined a batch.

use crate::session::{
    ControlEndpoint, NetworkSession, SessionSettings, DEFAULT_CONTROL_PORT, DEFAULT_STREAM_PORT,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wadxl_core::{
    AxisMap, BatchBulkHelper, BatchSource, ErrorCounter, MeasurementCollector, MotionClock,
    SampleBatch, SampleBuffer, WadxlError, WadxlResult, SCALE_XY, SCALE_Z,
};

/// Wire name under which the sample stream is published.
pub const DUMP_ENDPOINT: &str = "adxl345/dump_adxl345";

/// Selector field naming the sensor in a subscription.
pub const DUMP_SENSOR_KEY: &str = "sensor";

/// Columns of each published sample row.
pub const DUMP_HEADER: [&str; 4] = ["time", "x_acceleration", "y_acceleration", "z_acceleration"];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one wireless accelerometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WadxlConfig {
    /// Section name, `"wadxl"` or `"wadxl <chip>"`
    pub name: String,

    /// Host name or IP address of the peripheral
    pub ip: String,

    /// WebSocket stream port (default: 81)
    pub stream_port: u16,

    /// HTTP control port (default: 80)
    pub control_port: u16,

    /// Output axis assignment, e.g. `["x", "-z", "y"]`
    pub axes_map: Vec<String>,

    /// Bound on waiting for the stream to open
    pub connect_timeout_ms: u64,

    /// Bound on each control request
    pub control_timeout_ms: u64,

    /// Bound on joining the receive task when closing
    pub close_timeout_ms: u64,

    /// Batch cadence
    pub batch_interval_ms: u64,

    /// Directory for measurement CSV files
    pub output_dir: PathBuf,
}

impl Default for WadxlConfig {
    fn default() -> Self {
        Self {
            name: "wadxl".to_string(),
            ip: "wadxl.local".to_string(),
            stream_port: DEFAULT_STREAM_PORT,
            control_port: DEFAULT_CONTROL_PORT,
            axes_map: wadxl_core::DEFAULT_AXES
                .iter()
                .map(|axis| axis.to_string())
                .collect(),
            connect_timeout_ms: 15_000,
            control_timeout_ms: 5_000,
            close_timeout_ms: 2_000,
            batch_interval_ms: 100,
            output_dir: PathBuf::from("/tmp"),
        }
    }
}

impl WadxlConfig {
    /// Check values and compile the axis map.
    pub fn validate(&self) -> WadxlResult<AxisMap> {
        if self.name.split_whitespace().next().is_none() {
            return Err(WadxlError::Config("name must not be empty".into()));
        }
        if self.ip.trim().is_empty() {
            return Err(WadxlError::Config("ip must not be empty".into()));
        }
        for (field, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("control_timeout_ms", self.control_timeout_ms),
            ("close_timeout_ms", self.close_timeout_ms),
            ("batch_interval_ms", self.batch_interval_ms),
        ] {
            if value == 0 {
                return Err(WadxlError::Config(format!("{} must be positive", field)));
            }
        }
        AxisMap::build(&self.axes_map, SCALE_XY, SCALE_XY, SCALE_Z)
    }

    /// Chip name: the last word of `name`.
    pub fn chip_name(&self) -> &str {
        self.name.split_whitespace().last().unwrap_or("wadxl")
    }

    /// Base name: the first word of `name`.
    pub fn base_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("wadxl")
    }

    /// Session settings derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            host: self.ip.trim().to_string(),
            stream_port: self.stream_port,
            control_port: self.control_port,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            control_timeout: Duration::from_millis(self.control_timeout_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        }
    }
}

// =============================================================================
// Sampling core
// =============================================================================

/// Whether a streaming session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No streaming session
    Idle,
    /// Sampling started on the peripheral
    Sampling,
}

/// Batch source backing the driver: session, buffer, counters and axis map.
struct SamplingCore {
    session: NetworkSession,
    buffer: Arc<SampleBuffer>,
    errors: Arc<ErrorCounter>,
    axes: AxisMap,
    state: Mutex<DriverState>,
}

#[async_trait]
impl BatchSource for SamplingCore {
    async fn start_measurements(&self) -> WadxlResult<()> {
        tracing::info!(host = %self.session.settings().host, "Starting measurements");

        self.session.connect().await;

        let response = self.session.send_control(ControlEndpoint::Start).await;
        if !response.success {
            return Err(WadxlError::Command(format!(
                "Failed to start sampling: {}",
                response.body
            )));
        }

        self.buffer.clear();
        self.errors.reset();
        *self.state.lock() = DriverState::Sampling;
        tracing::info!("Measurements started");
        Ok(())
    }

    async fn finish_measurements(&self) -> WadxlResult<()> {
        tracing::info!("Finishing measurements");

        let response = self.session.send_control(ControlEndpoint::End).await;
        if !response.success {
            tracing::error!(response = %response.body, "Failed to stop sampling");
        }

        self.session.close().await;
        *self.state.lock() = DriverState::Idle;
        tracing::info!(errors = self.errors.get(), "Measurements finished");
        Ok(())
    }

    fn process_batch(&self) -> Option<SampleBatch> {
        let raw = self.buffer.drain_all();
        if raw.is_empty() {
            return None;
        }
        Some(SampleBatch {
            data: self.axes.convert_samples(&raw),
            errors: self.errors.get(),
            overflows: 0,
        })
    }
}

// =============================================================================
// WirelessAdxl345
// =============================================================================

/// Driver for a network-attached ADXL345.
///
/// # Example
///
/// ```rust,ignore
/// let driver = WirelessAdxl345::new(WadxlConfig::default(), clock)?;
/// let collector = driver.start_internal_client().await?;
/// clock.dwell(1.0).await;
/// collector.finalize().await;
/// let samples = collector.materialize_samples();
/// ```
pub struct WirelessAdxl345 {
    config: WadxlConfig,
    core: Arc<SamplingCore>,
    bulk: BatchBulkHelper,
    clock: Arc<dyn MotionClock>,
}

impl WirelessAdxl345 {
    /// Build a driver from validated configuration. Does not touch the
    /// network.
    pub fn new(config: WadxlConfig, clock: Arc<dyn MotionClock>) -> WadxlResult<Self> {
        let axes = config.validate()?;
        let buffer = Arc::new(SampleBuffer::new());
        let errors = Arc::new(ErrorCounter::new());
        let session = NetworkSession::new(config.session_settings(), buffer.clone(), errors.clone());

        let core = Arc::new(SamplingCore {
            session,
            buffer,
            errors,
            axes,
            state: Mutex::new(DriverState::Idle),
        });
        let bulk = BatchBulkHelper::new(
            core.clone(),
            Duration::from_millis(config.batch_interval_ms),
        );
        bulk.add_mux_endpoint(DUMP_ENDPOINT, DUMP_SENSOR_KEY, config.chip_name(), &DUMP_HEADER)?;

        tracing::debug!(name = %config.name, ip = %config.ip, "Wireless ADXL345 configured");

        Ok(Self {
            config,
            core,
            bulk,
            clock,
        })
    }

    /// Driver configuration.
    pub fn config(&self) -> &WadxlConfig {
        &self.config
    }

    /// Motion clock shared with collectors.
    pub fn clock(&self) -> &Arc<dyn MotionClock> {
        &self.clock
    }

    /// Compiled axis map.
    pub fn axis_map(&self) -> &AxisMap {
        &self.core.axes
    }

    /// Current streaming state.
    pub fn state(&self) -> DriverState {
        *self.core.state.lock()
    }

    /// Whether the sample stream is open.
    pub fn is_connected(&self) -> bool {
        self.core.session.is_connected()
    }

    /// Errors counted since the current session started.
    pub fn error_count(&self) -> u32 {
        self.core.errors.get()
    }

    /// Batch facility, for hosts that register their own clients.
    pub fn batch_bulk(&self) -> &BatchBulkHelper {
        &self.bulk
    }

    /// Open a collector and register it for every following batch.
    ///
    /// Starts streaming if no other collector is active. On a start failure
    /// the driver stays idle and a later call starts from scratch.
    pub async fn start_internal_client(&self) -> WadxlResult<Arc<MeasurementCollector>> {
        let collector = MeasurementCollector::new(self.clock.clone());
        self.bulk.add_client(collector.clone()).await?;
        Ok(collector)
    }

    /// Drain the buffer and convert it, as the periodic callback does.
    pub fn process_batch(&self) -> Option<SampleBatch> {
        self.core.process_batch()
    }

    /// Stop streaming and drop every registered collector.
    pub async fn shutdown(&self) -> WadxlResult<()> {
        self.bulk.shutdown().await
    }

    /// Register reads are not available over the wireless link.
    pub fn read_reg(&self, reg: u8) -> WadxlResult<u8> {
        tracing::warn!(reg, "Register read not supported in wireless mode");
        Err(WadxlError::NotSupported("Register read"))
    }

    /// Register writes are not available over the wireless link.
    pub fn set_reg(&self, reg: u8, val: u8) -> WadxlResult<()> {
        tracing::warn!(reg, val, "Register write not supported in wireless mode");
        Err(WadxlError::NotSupported("Register write"))
    }
}
