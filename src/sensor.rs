// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Tank temperature source.
//!
//! An external logger writes the latest reading as a single decimal into a
//! plain-text file. The file's modification time is the staleness clock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Result of one sensor read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Latest temperature, or the previous one if the read failed.
    pub temp: f64,
    /// True if the read failed or the sample is too old.
    pub stale: bool,
}

/// Something that yields a temperature reading each control tick.
pub trait TemperatureSource: Send + Sync {
    /// Read a sample. `previous` is kept as the temperature on failure.
    fn read(&self, previous: f64) -> Reading;
}

/// Sensor backed by a text file.
#[derive(Debug, Clone)]
pub struct FileTemperatureSource {
    path: PathBuf,
    stale_after: Duration,
}

impl FileTemperatureSource {
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
        }
    }

    /// Read the file, judging staleness against `now`.
    pub fn read_at(&self, previous: f64, now: SystemTime) -> Reading {
        match read_sample(&self.path) {
            Ok((temp, modified)) => {
                // a clock that went backwards counts as fresh
                let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
                let stale = age > self.stale_after;
                if stale {
                    log::warn!(
                        "{} is {}s old: temp outdated",
                        self.path.display(),
                        age.as_secs()
                    );
                }
                Reading { temp, stale }
            }
            Err(e) => {
                log::warn!("unable to read {}: {e}: temp outdated", self.path.display());
                Reading {
                    temp: previous,
                    stale: true,
                }
            }
        }
    }
}

impl TemperatureSource for FileTemperatureSource {
    fn read(&self, previous: f64) -> Reading {
        self.read_at(previous, SystemTime::now())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_sample(path: &Path) -> io::Result<(f64, SystemTime)> {
    let contents = fs::read_to_string(path)?;
    let modified = fs::metadata(path)?.modified()?;
    let temp = parse_temp(&contents)?;
    Ok((temp, modified))
}

fn parse_temp(contents: &str) -> io::Result<f64> {
    let trimmed = contents.trim();
    match trimmed.parse::<f64>() {
        Ok(t) if t.is_finite() => Ok(t),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("not a temperature: {trimmed:?}"),
        )),
    }
}
