//! Core logic for the SensorLap dashboard screen.
//! Platform shells (FFI, CLI) only translate calls into this crate.

pub mod config;
pub mod health;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod sensor;
pub mod service;

pub use config::{ConfigError, DashboardConfig, CONFIG_PATH_ENV};
pub use health::bridge::{HealthBridge, StartProbe};
pub use health::buffered::BufferedHealthService;
pub use health::service::{
    provider_onboarding_uri, AggregateMetric, AggregateValue, HealthAvailability, HealthError,
    HealthResult, HealthService,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::health_record::{
    HealthRecordType, HealthRecordValidationError, HeartRateRecord, HeartRateSample, StepsRecord,
    TimeRange,
};
pub use model::sample::{HealthSample, LightSample, NoiseSample};
pub use model::timer::{LapRecord, StopwatchPhase, TimerState};
pub use runtime::clock::{Clock, ManualClock, SystemClock};
pub use runtime::task::{PeriodicTask, ScreenScope, TaskControl};
pub use sensor::audio::{AudioError, AudioSource, PcmFeed, PcmFeedSource};
pub use sensor::light::{LightSampler, SensorError, SensorEvent, SensorKind, SensorService};
pub use sensor::noise::{decibel_level, rms_amplitude, NoiseError, NoiseSampler};
pub use service::dashboard::{
    Dashboard, DashboardDeps, DashboardError, DashboardResult, DashboardSnapshot, DashboardView,
};
pub use service::format::format_elapsed;
pub use service::permission::{
    HealthPermission, PermissionError, PermissionFlow, PermissionState,
    REQUIRED_HEALTH_PERMISSIONS,
};
pub use service::stopwatch::{
    LapButtonOutcome, StartStopOutcome, Stopwatch, StopwatchError, StopwatchResult,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
