//! Screen-level domain model.
//!
//! # Responsibility
//! - Define the plain data shared by stopwatch, samplers and health bridge.
//! - Keep every type free of platform handles so it can cross FFI and tests.
//!
//! # Invariants
//! - All timestamps are Unix epoch milliseconds.
//! - Laps are stored newest first.

pub mod health_record;
pub mod sample;
pub mod timer;
