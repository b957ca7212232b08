//! FFI use-case API for the Flutter dashboard screen.
//!
//! # Responsibility
//! - Expose the dashboard view-model to Dart via FRB as sync calls.
//! - Translate platform callbacks (sensor events, PCM frames, health
//!   records, permission results) into core calls.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - At most one dashboard session exists per process; opening a new one
//!   closes the previous session first.
//! - Background tasks run on a dedicated runtime; Dart only sees results
//!   through `dashboard_frame`.

use log::debug;
use sensorlap_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    BufferedHealthService, Clock, Dashboard, DashboardConfig, DashboardDeps, DashboardError,
    HealthAvailability, HealthPermission, HeartRateRecord, HeartRateSample, LapButtonOutcome,
    PcmFeed, SensorError, SensorEvent, SensorKind, SensorService, StartStopOutcome, StepsRecord,
    SystemClock, TimeRange, REQUIRED_HEALTH_PERMISSIONS,
};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::runtime::{Builder, Runtime};

const PCM_FEED_DEFAULT_CAPACITY: u32 = 16_384;
const PCM_FEED_CAPACITY_MAX: u32 = 441_000;

static RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();
static SESSION: Mutex<Option<FfiSession>> = Mutex::new(None);

struct FfiSession {
    dashboard: Dashboard,
    health: Arc<BufferedHealthService>,
    pcm: Option<PcmFeed>,
}

/// Sensor registration is done by the Dart side; core only logs it.
struct DartManagedSensors;

impl SensorService for DartManagedSensors {
    fn register_listener(&self, kind: SensorKind) -> Result<(), SensorError> {
        debug!("event=sensor_register module=ffi status=ok kind={kind:?} owner=dart");
        Ok(())
    }

    fn unregister_all(&self) {
        debug!("event=sensor_unregister module=ffi status=ok owner=dart");
    }
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl DashboardActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Render state for one frame of the dashboard screen.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardFrame {
    pub session_id: String,
    pub time_text: String,
    pub noise_text: String,
    pub light_text: String,
    pub heart_rate_text: String,
    pub step_count_text: String,
    /// Lap rows, newest first.
    pub laps: Vec<String>,
    /// `idle|running|stopped`.
    pub phase: String,
    pub start_stop_label: String,
    pub lap_button_label: String,
    pub lap_enabled: bool,
    pub reset_enabled: bool,
    /// `unchecked|requested|granted|denied`.
    pub microphone_permission: String,
    pub health_permission: String,
    /// `unavailable|provider_update_required|available`.
    pub health_availability: String,
    /// Store page to open when the provider needs an update.
    pub provider_update_uri: Option<String>,
    pub noise_meter_active: bool,
}

/// Health permission batch for the Dart prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPermissionRequest {
    pub ok: bool,
    /// Platform permission strings to request.
    pub permissions: Vec<String>,
    pub message: String,
}

/// One heart-rate sample pushed from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartRateSampleInput {
    pub time_epoch_ms: i64,
    pub beats_per_minute: u32,
}

/// Opens a dashboard session.
///
/// `health_availability` is the provider SDK status reported by Dart:
/// `available|provider_update_required|unavailable`; unknown values count as
/// unavailable.
///
/// # FFI contract
/// - Closes any previous session first.
/// - Reads optional JSON config from `SENSORLAP_CONFIG`.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_open(health_availability: String) -> DashboardActionResponse {
    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(err) => return DashboardActionResponse::failure(format!("dashboard_open failed: {err}")),
    };
    let config = match DashboardConfig::from_env() {
        Ok(config) => config,
        Err(err) => return DashboardActionResponse::failure(format!("dashboard_open failed: {err}")),
    };

    let mut slot = lock_session();
    if let Some(mut previous) = slot.take() {
        previous.dashboard.close();
    }

    let clock = Arc::new(SystemClock);
    let health = Arc::new(BufferedHealthService::new(
        clock.clone(),
        config.health_retention_secs,
    ));
    health.set_availability(parse_availability(&health_availability));
    let deps = DashboardDeps {
        clock,
        health: health.clone(),
        sensors: Arc::new(DartManagedSensors),
        runtime: runtime.handle().clone(),
    };
    let mut dashboard = match Dashboard::new(config, deps) {
        Ok(dashboard) => dashboard,
        Err(err) => return DashboardActionResponse::failure(format!("dashboard_open failed: {err}")),
    };
    let availability = match dashboard.open() {
        Ok(availability) => availability,
        Err(err) => return DashboardActionResponse::failure(format!("dashboard_open failed: {err}")),
    };
    *slot = Some(FfiSession {
        dashboard,
        health,
        pcm: None,
    });
    DashboardActionResponse::success(format!(
        "Dashboard opened (health {}).",
        availability.as_str()
    ))
}

/// Closes the session, cancelling every background task.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_close() -> DashboardActionResponse {
    match lock_session().take() {
        Some(mut session) => {
            if let Some(feed) = &session.pcm {
                feed.close();
            }
            session.dashboard.close();
            DashboardActionResponse::success("Dashboard closed.")
        }
        None => DashboardActionResponse::failure("dashboard_close failed: no open dashboard"),
    }
}

/// Applies pending task results and returns the current frame.
///
/// Returns `None` when no session is open.
#[flutter_rust_bridge::frb(sync)]
pub fn dashboard_frame() -> Option<DashboardFrame> {
    let mut slot = lock_session();
    let session = slot.as_mut()?;
    session.dashboard.pump();
    let snapshot = session.dashboard.snapshot();
    Some(DashboardFrame {
        session_id: snapshot.session_id,
        time_text: snapshot.view.time_text,
        noise_text: snapshot.view.noise_text,
        light_text: snapshot.view.light_text,
        heart_rate_text: snapshot.view.heart_rate_text,
        step_count_text: snapshot.view.step_count_text,
        laps: snapshot.view.laps,
        phase: snapshot.phase.as_str().to_string(),
        start_stop_label: snapshot.start_stop_label,
        lap_button_label: snapshot.lap_button_label,
        lap_enabled: snapshot.lap_enabled,
        reset_enabled: snapshot.reset_enabled,
        microphone_permission: snapshot.microphone_permission.as_str().to_string(),
        health_permission: snapshot.health_permission.as_str().to_string(),
        health_availability: snapshot.health_availability.as_str().to_string(),
        provider_update_uri: snapshot.provider_update_uri,
        noise_meter_active: snapshot.noise_meter_active,
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn stopwatch_start() -> DashboardActionResponse {
    with_dashboard("stopwatch_start", |session| {
        session.dashboard.start().map(|()| "Started.".to_string())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn stopwatch_stop() -> DashboardActionResponse {
    with_dashboard("stopwatch_stop", |session| {
        session.dashboard.stop().map(|()| "Stopped.".to_string())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn stopwatch_lap() -> DashboardActionResponse {
    with_dashboard("stopwatch_lap", |session| {
        session.dashboard.lap().map(|record| record.label())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn stopwatch_reset() -> DashboardActionResponse {
    with_dashboard("stopwatch_reset", |session| {
        session.dashboard.reset().map(|()| "Reset.".to_string())
    })
}

/// Single start/stop button.
#[flutter_rust_bridge::frb(sync)]
pub fn stopwatch_press_start_stop() -> DashboardActionResponse {
    with_dashboard("stopwatch_press_start_stop", |session| {
        session
            .dashboard
            .press_start_stop()
            .map(|outcome| match outcome {
                StartStopOutcome::Started => "Started.".to_string(),
                StartStopOutcome::Stopped => "Stopped.".to_string(),
            })
    })
}

/// Single lap/reset button: laps while running, resets otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn stopwatch_press_lap_or_reset() -> DashboardActionResponse {
    with_dashboard("stopwatch_press_lap_or_reset", |session| {
        session
            .dashboard
            .press_lap_or_reset()
            .map(|outcome| match outcome {
                LapButtonOutcome::Lapped(record) => record.label(),
                LapButtonOutcome::Reset => "Reset.".to_string(),
            })
    })
}

/// Forwards an ambient-light sensor event.
#[flutter_rust_bridge::frb(sync)]
pub fn light_sensor_changed(values: Vec<f32>) {
    if let Some(session) = lock_session().as_mut() {
        session.dashboard.on_sensor_changed(&SensorEvent {
            kind: SensorKind::Light,
            values,
        });
    }
}

/// Marks the microphone prompt as shown.
#[flutter_rust_bridge::frb(sync)]
pub fn microphone_permission_requested() -> DashboardActionResponse {
    with_dashboard("microphone_permission_requested", |session| {
        session
            .dashboard
            .request_microphone_permission()
            .map(|()| "Microphone permission requested.".to_string())
    })
}

/// Applies the microphone prompt outcome. `already_granted` skips the
/// prompt state for grants that existed before the screen opened.
#[flutter_rust_bridge::frb(sync)]
pub fn microphone_permission_result(granted: bool, already_granted: bool) -> DashboardActionResponse {
    with_dashboard("microphone_permission_result", |session| {
        if already_granted {
            session.dashboard.record_microphone_granted();
            return Ok("Microphone permission granted.".to_string());
        }
        session
            .dashboard
            .on_microphone_permission_result(granted)
            .map(|state| format!("Microphone permission {}.", state.as_str()))
    })
}

/// Starts the noise meter fed by `noise_push_pcm`.
///
/// `capacity` bounds buffered samples (default 16384, max 441000).
#[flutter_rust_bridge::frb(sync)]
pub fn noise_meter_start(capacity: Option<u32>) -> DashboardActionResponse {
    with_dashboard("noise_meter_start", |session| {
        let (feed, source) = PcmFeed::channel(normalize_pcm_capacity(capacity) as usize);
        session.dashboard.start_noise_meter(Box::new(source))?;
        session.pcm = Some(feed);
        Ok("Noise meter started.".to_string())
    })
}

/// Pushes captured 16-bit mono PCM. Returns how many old samples were dropped.
#[flutter_rust_bridge::frb(sync)]
pub fn noise_push_pcm(samples: Vec<i16>) -> u32 {
    lock_session()
        .as_ref()
        .and_then(|session| session.pcm.as_ref())
        .map(|feed| u32::try_from(feed.push(&samples)).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Marks the health prompt as shown and returns the permissions to request.
#[flutter_rust_bridge::frb(sync)]
pub fn health_permissions_request() -> HealthPermissionRequest {
    let mut slot = lock_session();
    let Some(session) = slot.as_mut() else {
        return HealthPermissionRequest {
            ok: false,
            permissions: Vec::new(),
            message: "health_permissions_request failed: no open dashboard".to_string(),
        };
    };
    match session.dashboard.request_health_permissions() {
        Ok(permissions) => HealthPermissionRequest {
            ok: true,
            permissions: permissions
                .iter()
                .map(|permission| permission.platform_name().to_string())
                .collect(),
            message: "Health permissions requested.".to_string(),
        },
        Err(err) => HealthPermissionRequest {
            ok: false,
            permissions: Vec::new(),
            message: format!("health_permissions_request failed: {err}"),
        },
    }
}

/// Applies the health prompt outcome.
///
/// `granted` lists the platform permission strings the user granted.
#[flutter_rust_bridge::frb(sync)]
pub fn health_permissions_result(granted: Vec<String>) -> DashboardActionResponse {
    let results = permission_results(&granted);
    with_dashboard("health_permissions_result", |session| {
        session
            .dashboard
            .on_health_permissions_result(&results)
            .map(|state| format!("Health permissions {}.", state.as_str()))
    })
}

/// Buffers a heart-rate record read from the platform broker.
#[flutter_rust_bridge::frb(sync)]
pub fn health_push_heart_rate(
    start_epoch_ms: i64,
    end_epoch_ms: i64,
    zone_offset_secs: Option<i32>,
    samples: Vec<HeartRateSampleInput>,
) -> DashboardActionResponse {
    let record = HeartRateRecord {
        start_epoch_ms,
        end_epoch_ms,
        start_zone_offset_secs: zone_offset_secs,
        end_zone_offset_secs: zone_offset_secs,
        samples: samples
            .into_iter()
            .map(|sample| HeartRateSample {
                time_epoch_ms: sample.time_epoch_ms,
                beats_per_minute: sample.beats_per_minute,
            })
            .collect(),
    };
    with_dashboard("health_push_heart_rate", |session| {
        session
            .dashboard
            .bridge()
            .insert_heart_rate(record)
            .map(|()| "Heart-rate record buffered.".to_string())
            .map_err(DashboardError::from)
    })
}

/// Buffers a step record read from the platform broker.
#[flutter_rust_bridge::frb(sync)]
pub fn health_push_steps(
    start_epoch_ms: i64,
    end_epoch_ms: i64,
    zone_offset_secs: Option<i32>,
    count: i64,
) -> DashboardActionResponse {
    let record = StepsRecord {
        start_epoch_ms,
        end_epoch_ms,
        start_zone_offset_secs: zone_offset_secs,
        end_zone_offset_secs: zone_offset_secs,
        count,
    };
    with_dashboard("health_push_steps", |session| {
        session
            .dashboard
            .bridge()
            .insert_steps(record)
            .map(|()| "Step record buffered.".to_string())
            .map_err(DashboardError::from)
    })
}

/// Aggregate step total over the trailing `window_secs`; `0` without a
/// session or on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn health_step_total(window_secs: u32) -> i64 {
    let slot = lock_session();
    let Some(session) = slot.as_ref() else {
        return 0;
    };
    let now = SystemClock.now_epoch_ms();
    session
        .dashboard
        .bridge()
        .total_steps(TimeRange::trailing(now, u64::from(window_secs)))
}

/// Updates the provider status after the user returns from the store.
#[flutter_rust_bridge::frb(sync)]
pub fn health_set_availability(health_availability: String) -> DashboardActionResponse {
    with_dashboard("health_set_availability", |session| {
        session
            .health
            .set_availability(parse_availability(&health_availability));
        session
            .dashboard
            .refresh_health_availability()
            .map(|availability| format!("Health {}.", availability.as_str()))
    })
}

fn runtime() -> Result<&'static Runtime, String> {
    RUNTIME
        .get_or_init(|| {
            Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("sensorlap-dashboard")
                .enable_time()
                .build()
                .map_err(|err| format!("runtime init failed: {err}"))
        })
        .as_ref()
        .map_err(Clone::clone)
}

fn lock_session() -> MutexGuard<'static, Option<FfiSession>> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

fn with_dashboard(
    operation: &str,
    f: impl FnOnce(&mut FfiSession) -> Result<String, DashboardError>,
) -> DashboardActionResponse {
    let mut slot = lock_session();
    let Some(session) = slot.as_mut() else {
        return DashboardActionResponse::failure(format!("{operation} failed: no open dashboard"));
    };
    match f(session) {
        Ok(message) => DashboardActionResponse::success(message),
        Err(err) => DashboardActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn parse_availability(value: &str) -> HealthAvailability {
    match value.trim().to_ascii_lowercase().as_str() {
        "available" => HealthAvailability::Available,
        "provider_update_required" => HealthAvailability::ProviderUpdateRequired,
        _ => HealthAvailability::Unavailable,
    }
}

fn normalize_pcm_capacity(capacity: Option<u32>) -> u32 {
    match capacity {
        Some(0) | None => PCM_FEED_DEFAULT_CAPACITY,
        Some(value) if value > PCM_FEED_CAPACITY_MAX => PCM_FEED_CAPACITY_MAX,
        Some(value) => value,
    }
}

fn permission_results(granted: &[String]) -> Vec<(HealthPermission, bool)> {
    REQUIRED_HEALTH_PERMISSIONS
        .iter()
        .map(|permission| {
            let is_granted = granted
                .iter()
                .any(|name| name.trim() == permission.platform_name());
            (*permission, is_granted)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, dashboard_close, dashboard_frame, dashboard_open, health_permissions_request,
        health_permissions_result, health_push_heart_rate, health_push_steps, health_step_total,
        init_logging, light_sensor_changed, microphone_permission_result, noise_meter_start,
        noise_push_pcm, normalize_pcm_capacity, parse_availability, permission_results, ping,
        stopwatch_lap, stopwatch_press_lap_or_reset, stopwatch_reset, stopwatch_start,
        stopwatch_stop, HeartRateSampleInput,
    };
    use sensorlap_core::{Clock, HealthAvailability, SystemClock};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(error.contains("unsupported log level"));
    }

    #[test]
    fn availability_parsing_defaults_to_unavailable() {
        assert_eq!(parse_availability(" Available "), HealthAvailability::Available);
        assert_eq!(
            parse_availability("provider_update_required"),
            HealthAvailability::ProviderUpdateRequired
        );
        assert_eq!(parse_availability("sdk_missing"), HealthAvailability::Unavailable);
    }

    #[test]
    fn pcm_capacity_is_normalized() {
        assert_eq!(normalize_pcm_capacity(None), 16_384);
        assert_eq!(normalize_pcm_capacity(Some(0)), 16_384);
        assert_eq!(normalize_pcm_capacity(Some(1_000_000)), 441_000);
        assert_eq!(normalize_pcm_capacity(Some(4_096)), 4_096);
    }

    #[test]
    fn permission_results_match_platform_names() {
        let results = permission_results(&[
            "android.permission.health.READ_HEART_RATE".to_string(),
            "android.permission.health.READ_STEPS".to_string(),
        ]);
        assert_eq!(results.len(), 4);
        assert_eq!(results.iter().filter(|(_, granted)| *granted).count(), 2);
    }

    // Single test for everything touching the process-wide session, so
    // parallel tests never race on it.
    #[test]
    fn dashboard_session_flow() {
        assert!(dashboard_frame().is_none());
        assert!(!stopwatch_start().ok);

        let opened = dashboard_open("available".to_string());
        assert!(opened.ok, "{}", opened.message);

        let frame = dashboard_frame().expect("frame after open");
        assert_eq!(frame.time_text, "00:00:00");
        assert_eq!(frame.phase, "idle");
        assert_eq!(frame.start_stop_label, "Start");

        assert!(stopwatch_start().ok);
        let lap = stopwatch_lap();
        assert!(lap.ok, "{}", lap.message);
        assert!(lap.message.starts_with("Lap 1: "));
        assert!(!stopwatch_reset().ok);
        assert!(stopwatch_stop().ok);
        assert_eq!(dashboard_frame().expect("frame").laps.len(), 1);

        let reset = stopwatch_press_lap_or_reset();
        assert_eq!(reset.message, "Reset.");
        assert!(dashboard_frame().expect("frame").laps.is_empty());

        light_sensor_changed(vec![42.0]);
        assert_eq!(dashboard_frame().expect("frame").light_text, "Light: 42 lx");

        assert!(!noise_meter_start(None).ok);
        assert!(microphone_permission_result(true, true).ok);
        assert!(noise_meter_start(Some(8)).ok);
        assert_eq!(noise_push_pcm(vec![1; 10]), 2);

        let request = health_permissions_request();
        assert!(request.ok, "{}", request.message);
        assert_eq!(request.permissions.len(), 4);
        let granted = health_permissions_result(request.permissions.clone());
        assert_eq!(granted.message, "Health permissions granted.");

        let now = SystemClock.now_epoch_ms();
        assert!(health_push_steps(now - 5_000, now - 1_000, None, 21).ok);
        assert!(!health_push_steps(now, now - 1, None, 1).ok);
        assert!(health_push_heart_rate(
            now - 2_000,
            now - 2_000,
            Some(32_400),
            vec![HeartRateSampleInput {
                time_epoch_ms: now - 2_000,
                beats_per_minute: 64,
            }],
        )
        .ok);
        assert_eq!(health_step_total(60), 21);

        assert!(dashboard_close().ok);
        assert!(dashboard_frame().is_none());
        assert!(!dashboard_close().ok);
    }
}
