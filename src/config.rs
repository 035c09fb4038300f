// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Configuration file handling.
//!
//! The heater settings come from a JSON document. Unlike daemon tunables,
//! `enableOffset` and `maxTemp` have no defaults: a missing or malformed
//! file is a startup error.
//! Default path: `/home/pi/aton.json`

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/home/pi/aton.json";

/// Default HTTP listen address for the control API.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Default sensor file, written by an external logger.
pub const DEFAULT_TEMP_PATH: &str = "/home/pi/temp.txt";

/// Default control loop period in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Default staleness window for the sensor file, in seconds.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 300;

/// Default sysfs PWM chip.
pub const DEFAULT_PWM_CHIP: &str = "/sys/class/pwm/pwmchip0";

/// Default PWM output frequency.
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 1000;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Hysteresis margin below `max_temp` at which heating may start.
    pub enable_offset: f64,

    /// Initial ceiling temperature in degrees Celsius.
    pub max_temp: f64,

    /// Daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Control loop period, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Address the control API listens on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// File holding the latest tank temperature.
    #[serde(default = "default_temp_path")]
    pub temp_path: PathBuf,

    /// Readings older than this are treated as outdated.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// sysfs PWM chip directory.
    #[serde(default = "default_pwm_chip")]
    pub pwm_chip: PathBuf,

    /// Channel index on the chip.
    #[serde(default)]
    pub pwm_channel: u32,

    /// PWM output frequency in Hz.
    #[serde(default = "default_pwm_frequency")]
    pub pwm_frequency_hz: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            listen: DEFAULT_LISTEN_ADDR.to_string(),
            temp_path: PathBuf::from(DEFAULT_TEMP_PATH),
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            pwm_chip: PathBuf::from(DEFAULT_PWM_CHIP),
            pwm_channel: 0,
            pwm_frequency_hz: DEFAULT_PWM_FREQUENCY_HZ,
        }
    }
}

impl Config {
    /// Check values that would leave the controller in an undefined state.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enable_offset.is_finite() || self.enable_offset < 0.0 {
            return Err(format!(
                "enableOffset must be a non-negative number, got {}",
                self.enable_offset
            ));
        }
        if !self.max_temp.is_finite() {
            return Err(format!("maxTemp must be finite, got {}", self.max_temp));
        }
        if self.daemon.poll_interval_ms == 0 {
            return Err("pollIntervalMs must be greater than 0".to_string());
        }
        if self.daemon.pwm_frequency_hz == 0 {
            return Err("pwmFrequencyHz must be greater than 0".to_string());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Parse and validate a config document.
pub fn parse_config(contents: &str) -> io::Result<Config> {
    let config: Config = serde_json::from_str(contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse config: {e}"),
        )
    })?;

    config
        .validate()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(config)
}

/// Load config from a JSON file. A missing file is an error.
pub fn load_config(path: &Path) -> io::Result<Config> {
    let contents = fs::read_to_string(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to read config {}: {e}", path.display()),
        )
    })?;
    let config = parse_config(&contents)?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve the config file path from CLI arg or default.
pub fn resolve_config_path(cli_path: Option<&str>) -> PathBuf {
    cli_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_listen() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_temp_path() -> PathBuf {
    PathBuf::from(DEFAULT_TEMP_PATH)
}

fn default_stale_after() -> u64 {
    DEFAULT_STALE_AFTER_SECS
}

fn default_pwm_chip() -> PathBuf {
    PathBuf::from(DEFAULT_PWM_CHIP)
}

fn default_pwm_frequency() -> u32 {
    DEFAULT_PWM_FREQUENCY_HZ
}
