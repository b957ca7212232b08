//! Ambient-light forwarding and sensor registration seam.

use crate::model::sample::LightSample;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Sensor kinds the dashboard distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Light,
    /// Any other platform sensor type id.
    Other(i32),
}

/// Raw sensor callback payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub kind: SensorKind,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    Unavailable(SensorKind),
    RegistrationFailed(String),
}

impl Display for SensorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(kind) => write!(f, "sensor not available: {kind:?}"),
            Self::RegistrationFailed(message) => {
                write!(f, "sensor registration failed: {message}")
            }
        }
    }
}

impl Error for SensorError {}

/// Platform sensor service.
pub trait SensorService: Send + Sync {
    fn register_listener(&self, kind: SensorKind) -> Result<(), SensorError>;
    fn unregister_all(&self);
}

/// Keeps the last light value. No smoothing.
#[derive(Debug, Clone, Default)]
pub struct LightSampler {
    latest: Option<LightSample>,
}

impl LightSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<LightSample> {
        self.latest
    }

    /// Forwards the first value of a light event unmodified.
    ///
    /// Other sensor kinds and empty payloads are ignored.
    pub fn on_sensor_changed(&mut self, event: &SensorEvent) -> Option<LightSample> {
        if event.kind != SensorKind::Light {
            return None;
        }
        let lux = *event.values.first()?;
        let sample = LightSample { lux };
        self.latest = Some(sample);
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::{LightSampler, SensorEvent, SensorKind};

    #[test]
    fn forwards_first_light_value() {
        let mut sampler = LightSampler::new();
        let sample = sampler.on_sensor_changed(&SensorEvent {
            kind: SensorKind::Light,
            values: vec![321.5, 9.0, 1.0],
        });
        assert_eq!(sample.map(|s| s.lux), Some(321.5));
        assert_eq!(sampler.latest().map(|s| s.lux), Some(321.5));
    }

    #[test]
    fn ignores_other_sensors_and_empty_events() {
        let mut sampler = LightSampler::new();
        assert!(sampler
            .on_sensor_changed(&SensorEvent {
                kind: SensorKind::Other(1),
                values: vec![9.8],
            })
            .is_none());
        assert!(sampler
            .on_sensor_changed(&SensorEvent {
                kind: SensorKind::Light,
                values: Vec::new(),
            })
            .is_none());
        assert!(sampler.latest().is_none());
    }
}
