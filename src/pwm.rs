// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! sysfs PWM output for the heater power controller.
//!
//! Uses `/sys/class/pwm/pwmchipN/` (export, period, duty_cycle, enable).
//! All sysfs times are in nanoseconds. When the channel can't be opened at
//! startup the daemon keeps running in simulation mode.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::DaemonConfig;

// ---------------------------------------------------------------------------
// Output trait
// ---------------------------------------------------------------------------

/// A duty-cycle capable output.
pub trait PwmOutput: Send + Sync {
    /// Set the duty cycle in percent (0-100).
    fn set_duty(&self, percent: f64) -> io::Result<()>;

    /// Stop driving the output.
    fn disable(&self) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// sysfs implementation
// ---------------------------------------------------------------------------

/// An exported sysfs PWM channel.
#[derive(Debug, Clone)]
pub struct SysfsPwm {
    /// Absolute path to the `pwmN` directory
    channel_dir: PathBuf,
    /// Period in nanoseconds
    period_ns: u64,
}

impl SysfsPwm {
    /// Export `channel` on `chip` (if needed), program the period and enable it.
    pub fn open(chip: &Path, channel: u32, frequency_hz: u32) -> io::Result<Self> {
        if frequency_hz == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "PWM frequency must be greater than 0",
            ));
        }

        let channel_dir = chip.join(format!("pwm{channel}"));
        if !channel_dir.exists() {
            fs::write(chip.join("export"), format!("{channel}"))?;
        }

        let pwm = Self {
            channel_dir,
            period_ns: period_ns(frequency_hz),
        };

        // duty must never exceed the period, so clear it first
        write_value(&pwm.channel_dir.join("duty_cycle"), 0)?;
        write_value(&pwm.channel_dir.join("period"), pwm.period_ns)?;
        write_value(&pwm.channel_dir.join("enable"), 1)?;
        Ok(pwm)
    }

    pub fn channel_dir(&self) -> &Path {
        &self.channel_dir
    }
}

impl PwmOutput for SysfsPwm {
    fn set_duty(&self, percent: f64) -> io::Result<()> {
        write_value(
            &self.channel_dir.join("duty_cycle"),
            duty_ns(self.period_ns, percent),
        )
    }

    fn disable(&self) -> io::Result<()> {
        write_value(&self.channel_dir.join("enable"), 0)
    }
}

// ---------------------------------------------------------------------------
// Hardware mode
// ---------------------------------------------------------------------------

/// Hardware availability, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareMode {
    Attached,
    Unavailable,
}

/// The physical output, or its absence.
pub enum Hardware {
    Attached(Box<dyn PwmOutput>),
    Unavailable,
}

impl Hardware {
    /// Open the configured channel, falling back to [`Hardware::Unavailable`].
    pub fn open(cfg: &DaemonConfig) -> Self {
        match SysfsPwm::open(&cfg.pwm_chip, cfg.pwm_channel, cfg.pwm_frequency_hz) {
            Ok(pwm) => {
                log::info!(
                    "PWM output on {} at {} Hz",
                    pwm.channel_dir().display(),
                    cfg.pwm_frequency_hz
                );
                Hardware::Attached(Box::new(pwm))
            }
            Err(e) => {
                log::warn!(
                    "Failed to open PWM channel {} on {}: {e}, running in simulation mode",
                    cfg.pwm_channel,
                    cfg.pwm_chip.display()
                );
                Hardware::Unavailable
            }
        }
    }

    pub fn mode(&self) -> HardwareMode {
        match self {
            Hardware::Attached(_) => HardwareMode::Attached,
            Hardware::Unavailable => HardwareMode::Unavailable,
        }
    }

    /// Write a duty cycle. A no-op in simulation mode.
    pub fn set_duty(&self, percent: f64) -> io::Result<()> {
        match self {
            Hardware::Attached(out) => out.set_duty(percent),
            Hardware::Unavailable => Ok(()),
        }
    }

    /// Drive the output to `percent` and then disable it.
    pub fn shut_off(&self, percent: f64) {
        if let Hardware::Attached(out) = self {
            if let Err(e) = out.set_duty(percent) {
                log::warn!("Failed to write final duty cycle: {e}");
            }
            if let Err(e) = out.disable() {
                log::warn!("Failed to disable PWM output: {e}");
            }
        }
    }
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hardware::{:?}", self.mode())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn period_ns(frequency_hz: u32) -> u64 {
    1_000_000_000 / u64::from(frequency_hz)
}

fn duty_ns(period_ns: u64, percent: f64) -> u64 {
    let ns = (period_ns as f64 * percent / 100.0).round();
    (ns.max(0.0) as u64).min(period_ns)
}

fn write_value(path: &Path, value: u64) -> io::Result<()> {
    fs::write(path, format!("{value}"))
}
