//! Microphone loudness sampling.
//!
//! # Invariants
//! - Amplitude is clamped to the floor before the logarithm, so the level is
//!   finite and never negative.
//! - RMS covers only the samples actually read, not the whole buffer.

use crate::model::sample::NoiseSample;
use crate::sensor::audio::{AudioError, AudioSource};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Amplitude floor that maps to 0 dB.
pub const DEFAULT_NOISE_FLOOR: f64 = 0.02;

/// Why the noise meter could not start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoiseError {
    PermissionNotGranted,
    AlreadyActive,
    Audio(AudioError),
}

impl Display for NoiseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionNotGranted => write!(f, "microphone permission not granted"),
            Self::AlreadyActive => write!(f, "noise meter already active"),
            Self::Audio(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NoiseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Audio(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AudioError> for NoiseError {
    fn from(value: AudioError) -> Self {
        Self::Audio(value)
    }
}

/// Root-mean-square of 16-bit PCM samples. Zero for an empty slice.
pub fn rms_amplitude(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_of_squares = samples
        .iter()
        .map(|&value| {
            let value = f64::from(value);
            value * value
        })
        .sum::<f64>();
    (sum_of_squares / samples.len() as f64).sqrt()
}

/// Relative level `20 * log10(max(amplitude, floor) / floor)`.
pub fn decibel_level(amplitude: f64, floor: f64) -> f64 {
    20.0 * (amplitude.max(floor) / floor).log10()
}

/// Builds one sample from raw PCM.
pub fn noise_sample(samples: &[i16], floor: f64) -> NoiseSample {
    let rms_amplitude = rms_amplitude(samples).max(floor);
    NoiseSample {
        rms_amplitude,
        decibel_level: decibel_level(rms_amplitude, floor),
    }
}

/// Started audio source plus its read buffer.
///
/// Stops the source when dropped.
pub struct NoiseSampler {
    source: Box<dyn AudioSource>,
    buffer: Vec<i16>,
    floor: f64,
}

impl NoiseSampler {
    /// Starts capture. A source that cannot start is returned as an error and
    /// never retried.
    pub fn start(
        mut source: Box<dyn AudioSource>,
        buffer_samples: usize,
        floor: f64,
    ) -> Result<Self, AudioError> {
        source.start()?;
        debug!(
            "event=noise_capture_start module=sensor status=ok buffer_samples={buffer_samples}"
        );
        Ok(Self {
            source,
            buffer: vec![0; buffer_samples.max(1)],
            floor,
        })
    }

    /// Reads one buffer. `Ok(None)` when nothing was captured.
    pub fn sample(&mut self) -> Result<Option<NoiseSample>, AudioError> {
        let read = self.source.read(&mut self.buffer)?.min(self.buffer.len());
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(noise_sample(&self.buffer[..read], self.floor)))
    }
}

impl Drop for NoiseSampler {
    fn drop(&mut self) {
        self.source.stop();
        debug!("event=noise_capture_stop module=sensor status=ok");
    }
}

/// Runs one sampling step, logging instead of failing.
pub fn sample_or_log(sampler: &mut NoiseSampler) -> Option<NoiseSample> {
    match sampler.sample() {
        Ok(sample) => sample,
        Err(err) => {
            warn!("event=noise_read module=sensor status=error error={err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decibel_level, noise_sample, rms_amplitude, NoiseSampler, DEFAULT_NOISE_FLOOR};
    use crate::sensor::audio::{AudioError, AudioSource};

    struct FixedSource {
        frames: Vec<Vec<i16>>,
        fail_start: bool,
    }

    impl AudioSource for FixedSource {
        fn start(&mut self) -> Result<(), AudioError> {
            if self.fail_start {
                return Err(AudioError::InitFailed("no device".to_string()));
            }
            Ok(())
        }

        fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError> {
            if self.frames.is_empty() {
                return Ok(0);
            }
            let frame = self.frames.remove(0);
            let len = frame.len().min(buffer.len());
            buffer[..len].copy_from_slice(&frame[..len]);
            Ok(len)
        }

        fn stop(&mut self) {}
    }

    #[test]
    fn floor_amplitude_is_zero_decibels() {
        assert_eq!(decibel_level(DEFAULT_NOISE_FLOOR, DEFAULT_NOISE_FLOOR), 0.0);
    }

    #[test]
    fn ten_times_floor_is_twenty_decibels() {
        let level = decibel_level(10.0 * DEFAULT_NOISE_FLOOR, DEFAULT_NOISE_FLOOR);
        assert!((level - 20.0).abs() < 1e-9);
    }

    #[test]
    fn silence_clamps_to_floor() {
        let sample = noise_sample(&[0, 0, 0, 0], DEFAULT_NOISE_FLOOR);
        assert_eq!(sample.rms_amplitude, DEFAULT_NOISE_FLOOR);
        assert_eq!(sample.decibel_level, 0.0);
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms_amplitude(&[100, -100, 100, -100]) - 100.0).abs() < 1e-9);
        assert_eq!(rms_amplitude(&[]), 0.0);
    }

    #[test]
    fn sampler_uses_only_read_samples() {
        let source = FixedSource {
            frames: vec![vec![200, -200]],
            fail_start: false,
        };
        let mut sampler = NoiseSampler::start(Box::new(source), 8, DEFAULT_NOISE_FLOOR)
            .expect("start sampler");
        let sample = sampler.sample().expect("read").expect("non-empty read");
        assert!((sample.rms_amplitude - 200.0).abs() < 1e-9);
        assert!(sampler.sample().expect("empty read").is_none());
    }

    #[test]
    fn start_failure_is_reported() {
        let source = FixedSource {
            frames: Vec::new(),
            fail_start: true,
        };
        let err = NoiseSampler::start(Box::new(source), 8, DEFAULT_NOISE_FLOOR)
            .err()
            .expect("start should fail");
        assert!(matches!(err, AudioError::InitFailed(_)));
    }
}
