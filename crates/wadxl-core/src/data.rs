//! Sample types flowing through the acquisition pipeline.

/// Standard gravity in mm/s².
pub const FREEFALL_ACCEL: f64 = 9.80665 * 1000.0;

/// Default scale (mm/s² per raw LSB) for the X and Y axes at ±16 g, 13-bit.
pub const SCALE_XY: f64 = (16.0 * 2.0 * FREEFALL_ACCEL) / 8192.0;

/// Default scale (mm/s² per raw LSB) for the Z axis.
pub const SCALE_Z: f64 = SCALE_XY;

/// Unconverted reading as received from the peripheral.
///
/// `time` is the device microsecond counter scaled to seconds. No clock
/// synchronisation with the host is attempted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Device timestamp in seconds
    pub time: f64,
    /// Raw X reading
    pub x: i32,
    /// Raw Y reading
    pub y: i32,
    /// Raw Z reading
    pub z: i32,
}

impl RawSample {
    /// Create a raw sample from a device timestamp in microseconds.
    pub fn from_micros(timestamp_micros: f64, x: i32, y: i32, z: i32) -> Self {
        Self {
            time: timestamp_micros / 1_000_000.0,
            x,
            y,
            z,
        }
    }

    /// The raw axes as an indexable triple.
    pub fn xyz(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Converted acceleration reading in mm/s².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelSample {
    /// Sample time in seconds
    pub time: f64,
    /// X acceleration
    pub accel_x: f64,
    /// Y acceleration
    pub accel_y: f64,
    /// Z acceleration
    pub accel_z: f64,
}

impl AccelSample {
    /// Create a new sample.
    pub fn new(time: f64, accel_x: f64, accel_y: f64, accel_z: f64) -> Self {
        Self {
            time,
            accel_x,
            accel_y,
            accel_z,
        }
    }
}

/// One delivery of converted samples from the periodic batch callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
    /// Converted samples in arrival order
    pub data: Vec<AccelSample>,
    /// Session error count at the time of the batch
    pub errors: u32,
    /// Overflow count (always zero for the wireless peripheral)
    pub overflows: u32,
}

impl SampleBatch {
    /// Time span `(first, last)` covered by this batch, if it holds samples.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let first = self.data.first()?;
        let last = self.data.last()?;
        Some((first.time, last.time))
    }
}

/// Round to 6 decimal places.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scale() {
        // 16 g full range over 13 bits
        assert!((SCALE_XY - 38.307226).abs() < 1e-5);
        assert_eq!(SCALE_XY, SCALE_Z);
    }

    #[test]
    fn test_from_micros() {
        let sample = RawSample::from_micros(1_500_000.0, 1, -2, 3);
        assert_eq!(sample.time, 1.5);
        assert_eq!(sample.xyz(), [1, -2, 3]);
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(1.23456789), 1.234568);
        assert_eq!(round6(-0.0000004), -0.0);
        assert_eq!(round6(10.0), 10.0);
    }

    #[test]
    fn test_time_span() {
        assert_eq!(SampleBatch::default().time_span(), None);
        let batch = SampleBatch {
            data: vec![
                AccelSample::new(1.0, 0.0, 0.0, 0.0),
                AccelSample::new(2.5, 0.0, 0.0, 0.0),
            ],
            ..Default::default()
        };
        assert_eq!(batch.time_span(), Some((1.0, 2.5)));
    }
}
