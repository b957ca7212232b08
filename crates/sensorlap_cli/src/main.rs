//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `sensorlap_core` linkage.
//! - Drive a short simulated dashboard session (synthetic tone, buffered
//!   health records) and print the final frame as JSON.
//!
//! Environment:
//! - `SENSORLAP_CONFIG`: optional JSON config path.
//! - `SENSORLAP_LOG_DIR`: absolute log directory; logging stays off when unset.
//! - `SENSORLAP_DEMO_MS`: session length in milliseconds (default 2500).

use log::info;
use sensorlap_core::{
    AudioError, AudioSource, BufferedHealthService, Clock, Dashboard, DashboardConfig,
    DashboardDeps, HealthService, HeartRateRecord, HeartRateSample, SensorError, SensorEvent,
    SensorKind, SensorService, StepsRecord, SystemClock,
};
use std::error::Error;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

const DEMO_MS_ENV: &str = "SENSORLAP_DEMO_MS";
const LOG_DIR_ENV: &str = "SENSORLAP_LOG_DIR";
const DEFAULT_DEMO_MS: u64 = 2_500;
const PUMP_INTERVAL_MS: u64 = 250;
const TONE_HZ: f32 = 440.0;
const TONE_AMPLITUDE: f32 = 3_000.0;

/// Sine tone standing in for the microphone.
struct ToneSource {
    sample_rate_hz: f32,
    phase: f32,
    recording: bool,
}

impl ToneSource {
    fn new(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz: sample_rate_hz as f32,
            phase: 0.0,
            recording: false,
        }
    }
}

impl AudioSource for ToneSource {
    fn start(&mut self) -> Result<(), AudioError> {
        self.recording = true;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [i16]) -> Result<usize, AudioError> {
        if !self.recording {
            return Err(AudioError::ReadFailed("tone source stopped".to_string()));
        }
        let step = TAU * TONE_HZ / self.sample_rate_hz;
        for slot in buffer.iter_mut() {
            *slot = (self.phase.sin() * TONE_AMPLITUDE) as i16;
            self.phase = (self.phase + step) % TAU;
        }
        Ok(buffer.len())
    }

    fn stop(&mut self) {
        self.recording = false;
    }
}

/// No physical sensors in the probe; light values are injected directly.
struct NoSensors;

impl SensorService for NoSensors {
    fn register_listener(&self, _kind: SensorKind) -> Result<(), SensorError> {
        Ok(())
    }

    fn unregister_all(&self) {}
}

fn demo_duration() -> Duration {
    let millis = std::env::var(DEMO_MS_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_DEMO_MS);
    Duration::from_millis(millis)
}

fn seed_health(service: &BufferedHealthService, now: i64) -> Result<(), Box<dyn Error>> {
    service.insert_heart_rate(&[HeartRateRecord {
        start_epoch_ms: now - 3_000,
        end_epoch_ms: now - 1_000,
        start_zone_offset_secs: None,
        end_zone_offset_secs: None,
        samples: vec![
            HeartRateSample {
                time_epoch_ms: now - 3_000,
                beats_per_minute: 68,
            },
            HeartRateSample {
                time_epoch_ms: now - 1_000,
                beats_per_minute: 72,
            },
        ],
    }])?;
    service.insert_steps(&[StepsRecord {
        start_epoch_ms: now - 8_000,
        end_epoch_ms: now - 500,
        start_zone_offset_secs: None,
        end_zone_offset_secs: None,
        count: 14,
    }])?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("sensorlap_core ping={}", sensorlap_core::ping());
    println!("sensorlap_core version={}", sensorlap_core::core_version());

    if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
        sensorlap_core::init_logging(sensorlap_core::default_log_level(), dir.as_str())?;
    }

    let config = DashboardConfig::from_env()?;
    let clock = Arc::new(SystemClock);
    let health = Arc::new(BufferedHealthService::new(
        clock.clone(),
        config.health_retention_secs,
    ));
    seed_health(&health, clock.now_epoch_ms())?;

    let sample_rate_hz = config.audio_sample_rate_hz;
    let mut dashboard = Dashboard::new(
        config,
        DashboardDeps {
            clock,
            health,
            sensors: Arc::new(NoSensors),
            runtime: Handle::current(),
        },
    )?;
    dashboard.open()?;
    dashboard.record_microphone_granted();
    dashboard.start_noise_meter(Box::new(ToneSource::new(sample_rate_hz)))?;
    let requested = dashboard.request_health_permissions()?;
    let results: Vec<_> = requested.iter().map(|permission| (*permission, true)).collect();
    dashboard.on_health_permissions_result(&results)?;
    dashboard.on_sensor_changed(&SensorEvent {
        kind: SensorKind::Light,
        values: vec![320.5],
    });

    dashboard.start()?;
    let total = demo_duration();
    let mut elapsed = Duration::ZERO;
    let mut lapped = false;
    while elapsed < total {
        tokio::time::sleep(Duration::from_millis(PUMP_INTERVAL_MS)).await;
        elapsed += Duration::from_millis(PUMP_INTERVAL_MS);
        dashboard.pump();
        if !lapped && elapsed >= total / 2 {
            let record = dashboard.lap()?;
            println!("{}", record.label());
            lapped = true;
        }
    }
    dashboard.stop()?;
    dashboard.pump();

    let snapshot = dashboard.snapshot();
    info!(
        "event=cli_demo module=cli status=ok session={} laps={}",
        snapshot.session_id,
        snapshot.view.laps.len()
    );
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    dashboard.close();
    Ok(())
}
