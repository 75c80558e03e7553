//! `wadxl`: measure with a wireless ADXL345 from the command line.

mod clock;
mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wadxl_driver::{format_query_response, AccelCommandHelper, MeasureOutcome, WirelessAdxl345};

use crate::clock::SystemClock;
use crate::config::{CliConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "wadxl", version, about = "Wireless ADXL345 accelerometer client")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the peripheral host
    #[arg(long)]
    ip: Option<String>,

    /// Override the log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record for a fixed time (or until Ctrl-C) and write a CSV file
    Measure {
        /// Recording time in seconds
        #[arg(short, long, default_value_t = 5.0)]
        duration: f64,
        /// Measurement name used in the file name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Print the current acceleration
    Query,
    /// Read a register (not supported over the wireless link)
    DebugRead {
        /// Register address, decimal or 0x-prefixed
        #[arg(long, value_parser = parse_number)]
        reg: i64,
    },
    /// Write a register (not supported over the wireless link)
    DebugWrite {
        /// Register address, decimal or 0x-prefixed
        #[arg(long, value_parser = parse_byte)]
        reg: u8,
        /// Value, decimal or 0x-prefixed
        #[arg(long, value_parser = parse_byte)]
        val: u8,
    },
}

fn parse_number(value: &str) -> Result<i64, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{}': {}", value, e))
}

fn parse_byte(value: &str) -> Result<u8, String> {
    let number = parse_number(value)?;
    u8::try_from(number).map_err(|_| format!("{} does not fit in a byte", number))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(ip) = cli.ip {
        config.sensor.ip = ip;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    logging::init(&config.logging.level, config.logging.compact).map_err(anyhow::Error::msg)?;

    let driver = WirelessAdxl345::new(config.sensor, Arc::new(SystemClock::new()))
        .context("Invalid accelerometer configuration")?;
    let commands = AccelCommandHelper::new(Arc::new(driver));

    let result = run(&commands, cli.command).await;
    if let Err(e) = commands.driver().shutdown().await {
        tracing::warn!(error = %e, "Shutdown did not complete cleanly");
    }
    result
}

async fn run(commands: &AccelCommandHelper, command: Command) -> Result<()> {
    match command {
        Command::Measure { duration, name } => {
            let duration = recording_time(duration)?;
            let started = commands.measure(None).await?;
            println!("{}", started.message());

            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, finishing measurement");
                }
            }

            let outcome = commands.measure(name.as_deref()).await?;
            println!("{}", outcome.message());
            if let MeasureOutcome::Writing { write, .. } = outcome {
                let path = write.await.context("CSV writer task failed")??;
                tracing::info!(path = %path.display(), "Measurement saved");
            }
        }
        Command::Query => {
            let sample = commands.query().await?;
            println!("{}", format_query_response(&sample));
        }
        Command::DebugRead { reg } => {
            println!("{}", commands.debug_read(reg)?);
        }
        Command::DebugWrite { reg, val } => {
            println!("{}", commands.debug_write(reg, val)?);
        }
    }
    Ok(())
}

/// Recording time from seconds; negative values record nothing.
fn recording_time(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds.max(0.0))
        .with_context(|| format!("Invalid recording time: {} s", seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("50"), Ok(50));
        assert_eq!(parse_number("0x32"), Ok(0x32));
        assert_eq!(parse_number("0X7f"), Ok(127));
        assert!(parse_number("0xzz").is_err());
        assert!(parse_byte("256").is_err());
        assert_eq!(parse_byte("0x08"), Ok(8));
    }

    #[test]
    fn test_recording_time() {
        assert_eq!(recording_time(2.5).unwrap(), Duration::from_millis(2500));
        assert_eq!(recording_time(-1.0).unwrap(), Duration::ZERO);
        assert!(recording_time(f64::INFINITY).is_err());
        assert!(recording_time(1e30).is_err());

        let cli = Cli::try_parse_from(["wadxl", "measure", "-d", "inf"]).unwrap();
        let Command::Measure { duration, .. } = cli.command else {
            panic!("expected measure");
        };
        assert!(recording_time(duration).is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "wadxl", "--ip", "10.0.0.7", "measure", "-d", "2.5", "-n", "bed",
        ])
        .unwrap();
        assert_eq!(cli.ip.as_deref(), Some("10.0.0.7"));
        assert!(matches!(
            cli.command,
            Command::Measure { duration, name: Some(ref n) } if duration == 2.5 && n == "bed"
        ));

        let cli = Cli::try_parse_from(["wadxl", "debug-read", "--reg", "0x32"]).unwrap();
        assert!(matches!(cli.command, Command::DebugRead { reg: 0x32 }));
    }
}
