//! Dashboard tunables.
//!
//! # Responsibility
//! - Hold poll periods, windows and audio settings with working defaults.
//! - Load overrides from a JSON file and validate them.
//!
//! # Invariants
//! - Every period is non-zero (tokio intervals reject zero).
//! - The noise floor is finite and positive.

use crate::sensor::audio::DEFAULT_SAMPLE_RATE_HZ;
use crate::sensor::noise::DEFAULT_NOISE_FLOOR;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// Env var naming an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "SENSORLAP_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub tick_interval_ms: u64,
    pub noise_interval_ms: u64,
    pub noise_floor: f64,
    pub audio_sample_rate_hz: u32,
    pub audio_buffer_samples: usize,
    pub health_poll_interval_ms: u64,
    pub health_window_secs: u64,
    pub start_probe_window_secs: u64,
    pub health_retention_secs: u64,
    /// BPM of a record inserted once health permissions are granted.
    pub seed_heart_rate_bpm: Option<u32>,
    pub seed_zone_offset_secs: Option<i32>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            noise_interval_ms: 1_000,
            noise_floor: DEFAULT_NOISE_FLOOR,
            audio_sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            audio_buffer_samples: 2_048,
            health_poll_interval_ms: 1_000,
            health_window_secs: 10,
            start_probe_window_secs: 60,
            health_retention_secs: 3_600,
            seed_heart_rate_bpm: None,
            seed_zone_offset_secs: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl DashboardConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Loads from `SENSORLAP_CONFIG` when set and non-blank, defaults
    /// otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(raw) if !raw.trim().is_empty() => Self::load(raw.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("tick_interval_ms", self.tick_interval_ms),
            ("noise_interval_ms", self.noise_interval_ms),
            ("health_poll_interval_ms", self.health_poll_interval_ms),
            ("health_window_secs", self.health_window_secs),
            ("start_probe_window_secs", self.start_probe_window_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }
        if !(self.noise_floor.is_finite() && self.noise_floor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "noise_floor must be positive, got {}",
                self.noise_floor
            )));
        }
        if self.audio_buffer_samples == 0 {
            return Err(ConfigError::Invalid(
                "audio_buffer_samples must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn noise_interval(&self) -> Duration {
        Duration::from_millis(self.noise_interval_ms)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }
}
