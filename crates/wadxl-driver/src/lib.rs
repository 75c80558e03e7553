//! Wireless ADXL345 accelerometer driver
//!
//! Host-side driver for ADXL345 boards that stream samples over Wi-Fi.
//!
//! # Communication
//!
//! - Samples arrive on a WebSocket at `ws://{ip}:81/`, one
//!   `timestampMicros,rawX,rawY,rawZ` record per line.
//! - Sampling is switched with `GET http://{ip}:80/start` and `/end`.
//!
//! Register-level access is not available over this link.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wadxl_driver::{AccelCommandHelper, WadxlConfig, WirelessAdxl345};
//!
//! let config: WadxlConfig = toml::from_str(r#"
//!     ip = "192.168.1.40"
//!     axes_map = ["x", "-z", "y"]
//! "#)?;
//! let driver = Arc::new(WirelessAdxl345::new(config, clock)?);
//! let commands = AccelCommandHelper::new(driver);
//! let sample = commands.query().await?;
//! ```

mod commands;
mod driver;
mod protocol;
mod session;

pub use commands::{
    format_query_response, AccelCommandHelper, MeasureOutcome, MAX_REGISTER, QUERY_DWELL_SECONDS,
};
pub use driver::{
    DriverState, WadxlConfig, WirelessAdxl345, DUMP_ENDPOINT, DUMP_HEADER, DUMP_SENSOR_KEY,
};
pub use protocol::{parse_frame, parse_record, ParsedFrame};
pub use session::{
    ingest_frame, ControlEndpoint, ControlResponse, LinkState, NetworkSession, SessionSettings,
};
