//! Stopwatch state model.
//!
//! # Responsibility
//! - Hold the raw timer fields owned by the screen view-model.
//! - Describe one recorded lap.
//!
//! # Invariants
//! - While `Running`, elapsed is `now - start_epoch_ms`.
//! - While `Idle` or `Stopped`, elapsed is frozen at `paused_offset_ms`.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of the stopwatch.
///
/// Replaces the bare `running` flag so lap and reset can be gated
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopwatchPhase {
    /// Never started, or reset since the last run.
    #[default]
    Idle,
    /// Counting.
    Running,
    /// Paused with a frozen offset.
    Stopped,
}

impl StopwatchPhase {
    /// Stable label used in log events and FFI envelopes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Raw timer fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimerState {
    /// Epoch ms the current run is measured from. Meaningful while running.
    pub start_epoch_ms: i64,
    /// Elapsed ms accumulated before the last stop.
    pub paused_offset_ms: i64,
    pub phase: StopwatchPhase,
}

impl TimerState {
    /// Returns elapsed milliseconds at `now_epoch_ms`.
    ///
    /// Never negative; a clock that moved backwards reads as zero.
    pub fn elapsed_ms(&self, now_epoch_ms: i64) -> i64 {
        let raw = if self.phase.is_running() {
            now_epoch_ms - self.start_epoch_ms
        } else {
            self.paused_offset_ms
        };
        raw.max(0)
    }
}

/// One recorded lap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapRecord {
    /// 1-based lap number.
    pub index: u32,
    /// Elapsed ms when the lap was taken.
    pub elapsed_ms: i64,
    /// Elapsed time rendered with the stopwatch formatter.
    pub formatted_duration: String,
}

impl LapRecord {
    /// Display row shown in the lap list, e.g. `Lap 3: 01:05:43`.
    pub fn label(&self) -> String {
        format!("Lap {}: {}", self.index, self.formatted_duration)
    }
}

#[cfg(test)]
mod tests {
    use super::{StopwatchPhase, TimerState};

    #[test]
    fn elapsed_tracks_clock_while_running() {
        let state = TimerState {
            start_epoch_ms: 1_000,
            paused_offset_ms: 0,
            phase: StopwatchPhase::Running,
        };
        assert_eq!(state.elapsed_ms(4_500), 3_500);
    }

    #[test]
    fn elapsed_is_frozen_while_stopped() {
        let state = TimerState {
            start_epoch_ms: 1_000,
            paused_offset_ms: 2_000,
            phase: StopwatchPhase::Stopped,
        };
        assert_eq!(state.elapsed_ms(99_000), 2_000);
    }

    #[test]
    fn elapsed_clamps_backwards_clock() {
        let state = TimerState {
            start_epoch_ms: 10_000,
            paused_offset_ms: 0,
            phase: StopwatchPhase::Running,
        };
        assert_eq!(state.elapsed_ms(9_000), 0);
    }
}
