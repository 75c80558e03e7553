//! Error types for the wireless accelerometer pipeline.
//!
//! `WadxlError` follows the failure taxonomy of the measurement pipeline:
//!
//! - **`Config`**: an invalid axis map or configuration value. Detected once
//!   at construction time, never mid-measurement.
//! - **`Transport`**: connect, control request, or mid-stream failures. These
//!   are logged and counted; only the ones on session start abort a
//!   transition.
//! - **`Protocol`**: a malformed stream record. Skipped per record and
//!   counted, never fatal.
//! - **`Usage`**: the caller asked for something that cannot be served (no
//!   samples, invalid measurement name, register out of range).
//! - **`Command`**: a start/stop transition failed and the caller must decide
//!   whether to retry the whole cycle.
//! - **`NotSupported`**: register-level access, which this peripheral class
//!   does not offer.
//!
//! No layer retries automatically; every failure is reported once.

use thiserror::Error;

/// Convenience alias for results using [`WadxlError`].
pub type WadxlResult<T> = std::result::Result<T, WadxlError>;

/// Primary error type for the wireless accelerometer driver.
#[derive(Error, Debug)]
pub enum WadxlError {
    /// Configuration rejected at load time (e.g. an unknown axis token).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network failure talking to the peripheral.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A stream record could not be parsed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The request cannot be served in the current state.
    #[error("{0}")]
    Usage(String),

    /// A measurement start/stop transition failed.
    #[error("{0}")]
    Command(String),

    /// The operation does not exist for this peripheral class.
    #[error("{0} not supported in wireless mode")]
    NotSupported(&'static str),

    /// Standard I/O failure (result files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = WadxlError::Config("invalid axis map".into());
        assert_eq!(err.to_string(), "Configuration error: invalid axis map");

        let err = WadxlError::NotSupported("Register read");
        assert_eq!(err.to_string(), "Register read not supported in wireless mode");

        let err = WadxlError::Command("Failed to start sampling: boom".into());
        assert_eq!(err.to_string(), "Failed to start sampling: boom");
    }
}
