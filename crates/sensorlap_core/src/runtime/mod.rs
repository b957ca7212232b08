//! Time sources and screen-bound task scheduling.
//!
//! # Responsibility
//! - Abstract wall-clock reads so timer logic is deterministic under test.
//! - Model periodic polling as cancellable tasks owned by the screen.
//!
//! # Invariants
//! - Dropping a task handle or scope cancels the work it owns.

pub mod clock;
pub mod task;
