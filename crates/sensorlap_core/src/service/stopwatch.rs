//! Stopwatch and lap list.
//!
//! # Responsibility
//! - Apply start/stop/lap/reset transitions to `TimerState`.
//! - Keep the lap list newest first with a monotonically increasing counter.
//!
//! # Invariants
//! - `lap` only succeeds while running.
//! - `reset` only succeeds while not running; it clears laps, restores the
//!   counter to 1 and zeroes the paused offset.
//! - Every transition takes `now` explicitly; nothing here reads a clock.

use crate::model::timer::{LapRecord, StopwatchPhase, TimerState};
use crate::service::format::{format_elapsed, DEFAULT_TIME_TEXT};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StopwatchResult<T> = Result<T, StopwatchError>;

/// Rejected stopwatch transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchError {
    AlreadyRunning,
    NotRunning,
    ResetWhileRunning,
}

impl Display for StopwatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "stopwatch is already running"),
            Self::NotRunning => write!(f, "stopwatch is not running"),
            Self::ResetWhileRunning => write!(f, "stopwatch cannot reset while running"),
        }
    }
}

impl Error for StopwatchError {}

/// What the combined lap/reset button did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LapButtonOutcome {
    Lapped(LapRecord),
    Reset,
}

/// What the combined start/stop button did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStopOutcome {
    Started,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Stopwatch {
    state: TimerState,
    laps: Vec<LapRecord>,
    next_lap_index: u32,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            state: TimerState::default(),
            laps: Vec::new(),
            next_lap_index: 1,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn phase(&self) -> StopwatchPhase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.phase.is_running()
    }

    /// Laps, newest first.
    pub fn laps(&self) -> &[LapRecord] {
        &self.laps
    }

    /// Number the next lap will carry.
    pub fn next_lap_index(&self) -> u32 {
        self.next_lap_index
    }

    pub fn elapsed_ms(&self, now_epoch_ms: i64) -> i64 {
        self.state.elapsed_ms(now_epoch_ms)
    }

    /// Time text for the main display.
    pub fn display_text(&self, now_epoch_ms: i64) -> String {
        match self.state.phase {
            StopwatchPhase::Idle => DEFAULT_TIME_TEXT.to_string(),
            _ => format_elapsed(self.elapsed_ms(now_epoch_ms)),
        }
    }

    /// Starts or resumes counting from the paused offset.
    pub fn start(&mut self, now_epoch_ms: i64) -> StopwatchResult<()> {
        if self.is_running() {
            return Err(StopwatchError::AlreadyRunning);
        }
        self.resume_at(now_epoch_ms);
        Ok(())
    }

    /// Freezes elapsed time at `now`.
    pub fn stop(&mut self, now_epoch_ms: i64) -> StopwatchResult<()> {
        if !self.is_running() {
            return Err(StopwatchError::NotRunning);
        }
        self.state.paused_offset_ms = (now_epoch_ms - self.state.start_epoch_ms).max(0);
        self.state.phase = StopwatchPhase::Stopped;
        Ok(())
    }

    /// Records a lap at `now` and returns it.
    pub fn lap(&mut self, now_epoch_ms: i64) -> StopwatchResult<LapRecord> {
        if !self.is_running() {
            return Err(StopwatchError::NotRunning);
        }
        let elapsed_ms = self.elapsed_ms(now_epoch_ms);
        let record = LapRecord {
            index: self.next_lap_index,
            elapsed_ms,
            formatted_duration: format_elapsed(elapsed_ms),
        };
        self.laps.insert(0, record.clone());
        self.next_lap_index += 1;
        Ok(record)
    }

    /// Clears laps and elapsed time.
    pub fn reset(&mut self) -> StopwatchResult<()> {
        if self.is_running() {
            return Err(StopwatchError::ResetWhileRunning);
        }
        self.clear();
        Ok(())
    }

    /// Single start/stop button.
    pub fn press_start_stop(&mut self, now_epoch_ms: i64) -> StartStopOutcome {
        match self.stop(now_epoch_ms) {
            Ok(()) => StartStopOutcome::Stopped,
            Err(_) => {
                self.resume_at(now_epoch_ms);
                StartStopOutcome::Started
            }
        }
    }

    /// Single lap/reset button: laps while running, resets otherwise.
    pub fn press_lap_or_reset(&mut self, now_epoch_ms: i64) -> LapButtonOutcome {
        match self.lap(now_epoch_ms) {
            Ok(record) => LapButtonOutcome::Lapped(record),
            Err(_) => {
                self.clear();
                LapButtonOutcome::Reset
            }
        }
    }

    fn resume_at(&mut self, now_epoch_ms: i64) {
        self.state.start_epoch_ms = now_epoch_ms - self.state.paused_offset_ms;
        self.state.phase = StopwatchPhase::Running;
    }

    fn clear(&mut self) {
        self.laps.clear();
        self.next_lap_index = 1;
        self.state = TimerState::default();
    }
}
