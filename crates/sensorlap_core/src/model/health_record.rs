//! Health-data records exchanged with the platform health service.
//!
//! # Responsibility
//! - Mirror the heart-rate and step record shapes of the platform broker.
//! - Validate records before they are inserted or buffered.
//!
//! # Invariants
//! - `end_epoch_ms >= start_epoch_ms` for every record and range.
//! - Heart-rate sample times lie inside their record interval.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Lowest BPM accepted by the platform broker.
pub const MIN_HEART_RATE_BPM: u32 = 1;
/// Highest BPM accepted by the platform broker.
pub const MAX_HEART_RATE_BPM: u32 = 300;
/// Highest step count the platform broker accepts in one record.
pub const MAX_STEPS_PER_RECORD: i64 = 1_000_000;

/// Half-open time filter `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
}

impl TimeRange {
    pub fn between(start_epoch_ms: i64, end_epoch_ms: i64) -> Self {
        Self {
            start_epoch_ms,
            end_epoch_ms,
        }
    }

    /// Window ending at `now_epoch_ms` and starting `window_secs` earlier.
    pub fn trailing(now_epoch_ms: i64, window_secs: u64) -> Self {
        let window_ms = i64::try_from(window_secs.saturating_mul(1_000)).unwrap_or(i64::MAX);
        Self {
            start_epoch_ms: now_epoch_ms.saturating_sub(window_ms),
            end_epoch_ms: now_epoch_ms,
        }
    }

    /// Whether the instant `epoch_ms` falls inside the range.
    pub fn contains(&self, epoch_ms: i64) -> bool {
        epoch_ms >= self.start_epoch_ms && epoch_ms < self.end_epoch_ms
    }

    /// Whether the interval `[start, end]` overlaps the range.
    ///
    /// Zero-length intervals overlap when their instant is contained.
    pub fn overlaps(&self, start_epoch_ms: i64, end_epoch_ms: i64) -> bool {
        if start_epoch_ms == end_epoch_ms {
            return self.contains(start_epoch_ms);
        }
        start_epoch_ms < self.end_epoch_ms && end_epoch_ms > self.start_epoch_ms
    }
}

/// Record kinds known to the health bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthRecordType {
    HeartRate,
    Steps,
}

impl HealthRecordType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::Steps => "steps",
        }
    }
}

/// One instantaneous heart-rate measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub time_epoch_ms: i64,
    pub beats_per_minute: u32,
}

/// Series of heart-rate samples over an interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateRecord {
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
    /// UTC offset in seconds at `start`, when the source reported one.
    pub start_zone_offset_secs: Option<i32>,
    pub end_zone_offset_secs: Option<i32>,
    pub samples: Vec<HeartRateSample>,
}

impl HeartRateRecord {
    /// Returns the latest sample by time, if any.
    pub fn latest_sample(&self) -> Option<&HeartRateSample> {
        self.samples.iter().max_by_key(|sample| sample.time_epoch_ms)
    }

    /// Checks interval, sample placement and BPM bounds.
    pub fn validate(&self) -> Result<(), HealthRecordValidationError> {
        validate_interval(self.start_epoch_ms, self.end_epoch_ms)?;
        if self.samples.is_empty() {
            return Err(HealthRecordValidationError::EmptySamples);
        }
        for sample in &self.samples {
            if sample.time_epoch_ms < self.start_epoch_ms
                || sample.time_epoch_ms > self.end_epoch_ms
            {
                return Err(HealthRecordValidationError::SampleOutsideInterval {
                    time: sample.time_epoch_ms,
                });
            }
            if !(MIN_HEART_RATE_BPM..=MAX_HEART_RATE_BPM).contains(&sample.beats_per_minute) {
                return Err(HealthRecordValidationError::HeartRateOutOfRange(
                    sample.beats_per_minute,
                ));
            }
        }
        Ok(())
    }
}

/// Step count accumulated over an interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepsRecord {
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
    pub start_zone_offset_secs: Option<i32>,
    pub end_zone_offset_secs: Option<i32>,
    pub count: i64,
}

impl StepsRecord {
    pub fn validate(&self) -> Result<(), HealthRecordValidationError> {
        validate_interval(self.start_epoch_ms, self.end_epoch_ms)?;
        if self.count < 0 {
            return Err(HealthRecordValidationError::NegativeStepCount(self.count));
        }
        if self.count > MAX_STEPS_PER_RECORD {
            return Err(HealthRecordValidationError::StepCountTooLarge(self.count));
        }
        Ok(())
    }
}

/// Record validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthRecordValidationError {
    InvalidInterval { start: i64, end: i64 },
    EmptySamples,
    SampleOutsideInterval { time: i64 },
    HeartRateOutOfRange(u32),
    NegativeStepCount(i64),
    StepCountTooLarge(i64),
}

impl Display for HealthRecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInterval { start, end } => {
                write!(f, "record end {end} is earlier than start {start}")
            }
            Self::EmptySamples => write!(f, "heart-rate record has no samples"),
            Self::SampleOutsideInterval { time } => {
                write!(f, "heart-rate sample at {time} lies outside its record")
            }
            Self::HeartRateOutOfRange(bpm) => write!(
                f,
                "heart rate {bpm} bpm outside {MIN_HEART_RATE_BPM}..={MAX_HEART_RATE_BPM}"
            ),
            Self::NegativeStepCount(count) => write!(f, "step count must not be negative: {count}"),
            Self::StepCountTooLarge(count) => {
                write!(f, "step count {count} exceeds {MAX_STEPS_PER_RECORD} per record")
            }
        }
    }
}

impl Error for HealthRecordValidationError {}

fn validate_interval(start: i64, end: i64) -> Result<(), HealthRecordValidationError> {
    if end < start {
        return Err(HealthRecordValidationError::InvalidInterval { start, end });
    }
    Ok(())
}
