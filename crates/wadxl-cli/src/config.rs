//! Configuration loading using Figment
//!
//! Configuration is merged from, in order of precedence (lowest first):
//! 1. built-in defaults
//! 2. a TOML file (default `config/wadxl.toml`, optional)
//! 3. environment variables prefixed with `WADXL_`, with `__` separating
//!    sections, e.g. `WADXL_SENSOR__IP=192.168.1.40`

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use wadxl_driver::WadxlConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/wadxl.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Logging settings
    pub logging: LoggingConfig,
    /// Accelerometer settings
    pub sensor: WadxlConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Single-line output without colors
    pub compact: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            compact: false,
        }
    }
}

impl CliConfig {
    /// Load configuration from `path` and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(CliConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("WADXL_").split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.sensor, WadxlConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wadxl.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [sensor]
            name = "wadxl toolhead"
            ip = "10.0.0.7"
            axes_map = ["z", "-x", "y"]
            batch_interval_ms = 50
            "#
        )
        .unwrap();

        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.compact);
        assert_eq!(config.sensor.ip, "10.0.0.7");
        assert_eq!(config.sensor.chip_name(), "toolhead");
        assert_eq!(config.sensor.batch_interval_ms, 50);
        assert_eq!(config.sensor.stream_port, 81);
        assert!(config.sensor.validate().is_ok());
    }
}
