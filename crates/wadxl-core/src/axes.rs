//! Axis remapping and unit conversion.
//!
//! An [`AxisMap`] is compiled once from three axis tokens (`x`, `-y`, `z`, ...)
//! and is read-only afterwards. Each output axis selects one raw device axis,
//! with a sign and a per-axis scale folded into a single factor.

use crate::data::{round6, AccelSample, RawSample};
use crate::error::{WadxlError, WadxlResult};

/// Default token triple.
pub const DEFAULT_AXES: [&str; 3] = ["x", "y", "z"];

/// Source selection for one output axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSource {
    /// Raw axis index (0 = x, 1 = y, 2 = z)
    pub index: usize,
    /// Scale applied to the raw value, sign included
    pub scale: f64,
}

/// Compiled permutation, sign and scale table from device axes to output axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMap {
    axes: [AxisSource; 3],
}

impl AxisMap {
    /// Compile an axis map from exactly three tokens.
    ///
    /// Tokens are trimmed and matched case-insensitively against
    /// `x, y, z, -x, -y, -z`. Every raw axis must be used exactly once.
    pub fn build<S: AsRef<str>>(
        tokens: &[S],
        scale_x: f64,
        scale_y: f64,
        scale_z: f64,
    ) -> WadxlResult<Self> {
        if tokens.len() != 3 {
            return Err(invalid_axis_map());
        }

        let scales = [scale_x, scale_y, scale_z];
        let mut axes = [AxisSource {
            index: 0,
            scale: 0.0,
        }; 3];
        let mut used = [false; 3];

        for (slot, token) in axes.iter_mut().zip(tokens) {
            let token = token.as_ref().trim().to_ascii_lowercase();
            let (negate, name) = match token.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, token.as_str()),
            };
            let index = match name {
                "x" => 0,
                "y" => 1,
                "z" => 2,
                _ => return Err(invalid_axis_map()),
            };
            if std::mem::replace(&mut used[index], true) {
                return Err(invalid_axis_map());
            }
            let scale = if negate { -scales[index] } else { scales[index] };
            *slot = AxisSource { index, scale };
        }

        Ok(Self { axes })
    }

    /// Identity mapping with the given scales.
    pub fn identity(scale_x: f64, scale_y: f64, scale_z: f64) -> Self {
        Self {
            axes: [
                AxisSource {
                    index: 0,
                    scale: scale_x,
                },
                AxisSource {
                    index: 1,
                    scale: scale_y,
                },
                AxisSource {
                    index: 2,
                    scale: scale_z,
                },
            ],
        }
    }

    /// Per-output-axis source table.
    pub fn axes(&self) -> &[AxisSource; 3] {
        &self.axes
    }

    /// Convert one raw sample, rounding time and axes to 6 decimals.
    pub fn convert(&self, raw: &RawSample) -> AccelSample {
        let xyz = raw.xyz();
        let [x, y, z] = self
            .axes
            .map(|axis| round6(f64::from(xyz[axis.index]) * axis.scale));
        AccelSample::new(round6(raw.time), x, y, z)
    }

    /// Convert a drained batch in arrival order.
    pub fn convert_samples(&self, samples: &[RawSample]) -> Vec<AccelSample> {
        samples.iter().map(|raw| self.convert(raw)).collect()
    }
}

fn invalid_axis_map() -> WadxlError {
    WadxlError::Config("Invalid axes_map parameter".to_string())
}
