//! Stream frame parsing.
//!
//! Each WebSocket frame carries newline-delimited records of the form
//! `timestampMicros,rawX,rawY,rawZ`. Extra trailing fields are ignored and
//! records with fewer than four fields are skipped silently. A record that has
//! four fields but does not parse is dropped on its own and counted as an
//! error; the rest of the frame is still used.

use wadxl_core::{RawSample, WadxlError, WadxlResult};

/// Outcome of parsing one frame.
#[derive(Debug, Default)]
pub struct ParsedFrame {
    /// Records that parsed, in frame order
    pub samples: Vec<RawSample>,
    /// Records that had enough fields but failed to parse
    pub errors: Vec<WadxlError>,
}

/// Parse a single record.
///
/// Returns `Ok(None)` for records that are empty or too short to carry a
/// sample.
pub fn parse_record(record: &str) -> WadxlResult<Option<RawSample>> {
    let record = record.trim();
    if record.is_empty() || !record.contains(',') {
        return Ok(None);
    }

    let fields: Vec<&str> = record.split(',').map(str::trim).collect();
    if fields.len() < 4 {
        return Ok(None);
    }

    let timestamp: f64 = fields[0]
        .parse()
        .map_err(|e| protocol_error(record, "timestamp", e))?;
    let x: i32 = fields[1].parse().map_err(|e| protocol_error(record, "x", e))?;
    let y: i32 = fields[2].parse().map_err(|e| protocol_error(record, "y", e))?;
    let z: i32 = fields[3].parse().map_err(|e| protocol_error(record, "z", e))?;

    Ok(Some(RawSample::from_micros(timestamp, x, y, z)))
}

/// Parse every record of a frame.
pub fn parse_frame(frame: &str) -> ParsedFrame {
    let mut parsed = ParsedFrame::default();
    for record in frame.trim().split('\n') {
        match parse_record(record) {
            Ok(Some(sample)) => parsed.samples.push(sample),
            Ok(None) => {}
            Err(e) => parsed.errors.push(e),
        }
    }
    parsed
}

fn protocol_error(record: &str, field: &str, err: impl std::fmt::Display) -> WadxlError {
    WadxlError::Protocol(format!("bad {} in record {:?}: {}", field, record, err))
}
