//! Screen use-case services.
//!
//! # Responsibility
//! - Hold the stopwatch rules, permission flows and display formatting.
//! - Compose them into the `Dashboard` view-model the FFI layer drives.

pub mod dashboard;
pub mod format;
pub mod permission;
pub mod stopwatch;
