//! Device sensor samplers.
//!
//! # Responsibility
//! - Turn raw microphone buffers into loudness samples.
//! - Forward ambient-light readings.
//! - Define the platform seams (`AudioSource`, `SensorService`).

pub mod audio;
pub mod light;
pub mod noise;
