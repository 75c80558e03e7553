//! Measurement commands.
//!
//! Typed equivalents of the host's accelerometer commands: toggle a
//! background measurement, query the current reading, and the register debug
//! commands, which this peripheral class does not support.

use crate::driver::WirelessAdxl345;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use wadxl_core::{AccelSample, MeasurementCollector, WadxlError, WadxlResult};

/// How long `query` samples before reading the last value.
pub const QUERY_DWELL_SECONDS: f64 = 1.0;

/// Highest register address accepted by `debug_read`.
pub const MAX_REGISTER: i64 = 127;

/// Result of a `measure` call.
#[derive(Debug)]
pub enum MeasureOutcome {
    /// A background measurement was started.
    Started,
    /// The running measurement was finalized and is being written.
    Writing {
        /// Destination CSV file
        path: PathBuf,
        /// Completion of the background write
        write: JoinHandle<WadxlResult<PathBuf>>,
    },
}

impl MeasureOutcome {
    /// Message reported back to the user.
    pub fn message(&self) -> String {
        match self {
            MeasureOutcome::Started => "accelerometer measurements started".to_string(),
            MeasureOutcome::Writing { path, .. } => format!(
                "Writing raw accelerometer data to {} file",
                path.display()
            ),
        }
    }
}

/// Command surface for one driver.
pub struct AccelCommandHelper {
    driver: Arc<WirelessAdxl345>,
    bg_client: Mutex<Option<Arc<MeasurementCollector>>>,
}

impl AccelCommandHelper {
    /// Create a helper around `driver`.
    pub fn new(driver: Arc<WirelessAdxl345>) -> Self {
        Self {
            driver,
            bg_client: Mutex::new(None),
        }
    }

    /// Underlying driver.
    pub fn driver(&self) -> &Arc<WirelessAdxl345> {
        &self.driver
    }

    /// Whether a background measurement is running.
    pub async fn is_measuring(&self) -> bool {
        self.bg_client.lock().await.is_some()
    }

    /// Start a background measurement, or finish the running one.
    ///
    /// Finishing writes the samples to `{output_dir}/{base}-{name}.csv`
    /// (`{base}-{chip}-{name}.csv` for named chips). `name` defaults to the
    /// local time and may only contain alphanumerics, `-` and `_`. The write
    /// runs in the background; the file may not exist when this returns.
    pub async fn measure(&self, name: Option<&str>) -> WadxlResult<MeasureOutcome> {
        let mut bg_client = self.bg_client.lock().await;
        let collector = match bg_client.clone() {
            Some(collector) => collector,
            None => {
                *bg_client = Some(self.driver.start_internal_client().await?);
                return Ok(MeasureOutcome::Started);
            }
        };

        let name = match name {
            Some(name) => name.to_string(),
            None => chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        };
        if !is_valid_name(&name) {
            return Err(WadxlError::Usage("Invalid NAME parameter".into()));
        }

        *bg_client = None;
        drop(bg_client);

        collector.finalize().await;
        let path = self.measurement_path(&name);
        let write = collector.write_to_file(path.clone());
        tracing::info!(path = %path.display(), "Writing raw accelerometer data");
        Ok(MeasureOutcome::Writing { path, write })
    }

    /// Sample briefly and return the most recent reading.
    pub async fn query(&self) -> WadxlResult<AccelSample> {
        let collector = self.driver.start_internal_client().await?;
        self.driver.clock().dwell(QUERY_DWELL_SECONDS).await;
        collector.finalize().await;

        let samples = collector.materialize_samples();
        samples
            .last()
            .copied()
            .ok_or_else(|| WadxlError::Usage("No accelerometer measurements found".into()))
    }

    /// Register read: validates the address, then reports no support.
    pub fn debug_read(&self, reg: i64) -> WadxlResult<String> {
        let reg = u8::try_from(reg)
            .ok()
            .filter(|reg| i64::from(*reg) <= MAX_REGISTER)
            .ok_or_else(|| {
                WadxlError::Usage(format!("REG must be between 0 and {}", MAX_REGISTER))
            })?;
        match self.driver.read_reg(reg) {
            Ok(val) => Ok(format!("ADXL345 REG[0x{:x}] = 0x{:x}", reg, val)),
            Err(WadxlError::NotSupported(_)) => {
                Ok("Wireless ADXL345 - Register reading not supported".to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Register write: always reports no support.
    pub fn debug_write(&self, reg: u8, val: u8) -> WadxlResult<String> {
        match self.driver.set_reg(reg, val) {
            Ok(()) => Ok(format!("ADXL345 REG[0x{:x}] set to 0x{:x}", reg, val)),
            Err(WadxlError::NotSupported(_)) => {
                Ok("Wireless ADXL345 - Register writing not supported".to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn measurement_path(&self, name: &str) -> PathBuf {
        let config = self.driver.config();
        let (base, chip) = (config.base_name(), config.chip_name());
        let file_name = if base == chip {
            format!("{}-{}.csv", base, name)
        } else {
            format!("{}-{}-{}.csv", base, chip, name)
        };
        config.output_dir.join(file_name)
    }
}

/// Response line for a query result.
pub fn format_query_response(sample: &AccelSample) -> String {
    format!(
        "accelerometer values (x, y, z): {:.6}, {:.6}, {:.6}",
        sample.accel_x, sample.accel_y, sample.accel_z
    )
}

fn is_valid_name(name: &str) -> bool {
    let stripped: String = name.chars().filter(|c| *c != '-' && *c != '_').collect();
    !stripped.is_empty() && stripped.chars().all(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::WadxlConfig;
    use async_trait::async_trait;
    use wadxl_core::MotionClock;

    struct FixedClock;

    #[async_trait]
    impl MotionClock for FixedClock {
        fn last_move_time(&self) -> f64 {
            0.0
        }
        async fn wait_moves(&self) {}
        async fn dwell(&self, _seconds: f64) {}
    }

    fn helper(name: &str) -> AccelCommandHelper {
        let config = WadxlConfig {
            name: name.to_string(),
            output_dir: PathBuf::from("/data"),
            ..Default::default()
        };
        let driver = WirelessAdxl345::new(config, Arc::new(FixedClock)).unwrap();
        AccelCommandHelper::new(Arc::new(driver))
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("20250101_120000"));
        assert!(is_valid_name("bed-x_run2"));
        assert!(!is_valid_name("../etc/passwd"));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("-_-"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_measurement_paths() {
        assert_eq!(
            helper("wadxl").measurement_path("run1"),
            PathBuf::from("/data/wadxl-run1.csv")
        );
        assert_eq!(
            helper("wadxl hotend").measurement_path("run1"),
            PathBuf::from("/data/wadxl-hotend-run1.csv")
        );
    }

    #[test]
    fn test_debug_commands() {
        let helper = helper("wadxl");
        assert_eq!(
            helper.debug_read(0x32).unwrap(),
            "Wireless ADXL345 - Register reading not supported"
        );
        assert!(matches!(helper.debug_read(128), Err(WadxlError::Usage(_))));
        assert!(matches!(helper.debug_read(-1), Err(WadxlError::Usage(_))));
        assert_eq!(
            helper.debug_write(0x2d, 0x08).unwrap(),
            "Wireless ADXL345 - Register writing not supported"
        );
    }

    #[test]
    fn test_query_response_format() {
        let sample = AccelSample::new(1.0, -20.0, 10.0, 9806.65);
        assert_eq!(
            format_query_response(&sample),
            "accelerometer values (x, y, z): -20.000000, 10.000000, 9806.650000"
        );
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            MeasureOutcome::Started.message(),
            "accelerometer measurements started"
        );
    }
}
