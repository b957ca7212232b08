//! Derived sensor samples.

use serde::{Deserialize, Serialize};

/// One microphone loudness reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSample {
    /// RMS amplitude after clamping to the configured floor.
    pub rms_amplitude: f64,
    /// `20 * log10(rms_amplitude / floor)`; never negative.
    pub decibel_level: f64,
}

/// One ambient-light reading, forwarded unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightSample {
    pub lux: f32,
}

/// Latest health readings over a trailing window.
///
/// `heart_rate_bpm` is `None` when the window holds no samples or the read
/// failed. `step_count` is `None` only when the read failed; an empty window
/// yields `Some(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthSample {
    pub heart_rate_bpm: Option<u32>,
    pub step_count: Option<i64>,
}
