//! Screen view-model tying the stopwatch, samplers and health bridge together.
//!
//! # Responsibility
//! - Own every piece of mutable screen state: timer, laps, display texts,
//!   permission flows.
//! - Start and cancel the periodic tasks (tick, noise, health poll) that are
//!   bound to this screen.
//! - Apply task results on the caller's thread through `pump()`.
//!
//! # Invariants
//! - Background tasks never touch the view; they only send messages.
//! - Health calls are made only while the health permission is `Granted`,
//!   and always on the blocking pool so a slow broker cannot stall ticks.
//! - A failed health or noise read never overwrites a displayed value.
//! - After `close()` no task owned by the screen keeps running.

use crate::config::{ConfigError, DashboardConfig};
use crate::health::bridge::{HealthBridge, StartProbe};
use crate::health::service::{
    provider_onboarding_uri, HealthAvailability, HealthError, HealthService,
};
use crate::model::sample::{HealthSample, NoiseSample};
use crate::model::timer::{LapRecord, StopwatchPhase};
use crate::runtime::clock::Clock;
use crate::runtime::task::{PeriodicTask, ScreenScope, TaskControl};
use crate::sensor::audio::AudioSource;
use crate::sensor::light::{LightSampler, SensorEvent, SensorKind, SensorService};
use crate::sensor::noise::{sample_or_log, NoiseError, NoiseSampler};
use crate::service::format::{
    heart_rate_text, light_text, noise_text, step_count_text, DEFAULT_TIME_TEXT,
};
use crate::service::permission::{
    all_health_permissions_granted, HealthPermission, PermissionError, PermissionFlow,
    PermissionState, REQUIRED_HEALTH_PERMISSIONS,
};
use crate::service::stopwatch::{LapButtonOutcome, StartStopOutcome, Stopwatch, StopwatchError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::ready;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::spawn_blocking;
use uuid::Uuid;

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    Closed,
    Stopwatch(StopwatchError),
    Permission(PermissionError),
    Noise(NoiseError),
    Health(HealthError),
}

impl Display for DashboardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "dashboard is closed"),
            Self::Stopwatch(err) => write!(f, "{err}"),
            Self::Permission(err) => write!(f, "{err}"),
            Self::Noise(err) => write!(f, "{err}"),
            Self::Health(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DashboardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Closed => None,
            Self::Stopwatch(err) => Some(err),
            Self::Permission(err) => Some(err),
            Self::Noise(err) => Some(err),
            Self::Health(err) => Some(err),
        }
    }
}

impl From<StopwatchError> for DashboardError {
    fn from(value: StopwatchError) -> Self {
        Self::Stopwatch(value)
    }
}

impl From<PermissionError> for DashboardError {
    fn from(value: PermissionError) -> Self {
        Self::Permission(value)
    }
}

impl From<NoiseError> for DashboardError {
    fn from(value: NoiseError) -> Self {
        Self::Noise(value)
    }
}

impl From<HealthError> for DashboardError {
    fn from(value: HealthError) -> Self {
        Self::Health(value)
    }
}

/// Results sent from screen tasks to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardMessage {
    Tick,
    Noise(NoiseSample),
    Health(HealthSample),
    StartProbe(StartProbe),
}

/// Texts currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardView {
    pub time_text: String,
    pub noise_text: String,
    pub light_text: String,
    pub heart_rate_text: String,
    pub step_count_text: String,
    /// Lap rows, newest first.
    pub laps: Vec<String>,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            time_text: DEFAULT_TIME_TEXT.to_string(),
            noise_text: noise_text(None),
            light_text: light_text(None),
            heart_rate_text: heart_rate_text(None),
            step_count_text: step_count_text(None),
            laps: Vec::new(),
        }
    }
}

/// Everything the UI shell needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub session_id: String,
    pub view: DashboardView,
    pub phase: StopwatchPhase,
    pub start_stop_label: String,
    pub lap_button_label: String,
    pub lap_enabled: bool,
    pub reset_enabled: bool,
    pub microphone_permission: PermissionState,
    pub health_permission: PermissionState,
    pub health_availability: HealthAvailability,
    /// Set when the provider must be updated before health data can flow.
    pub provider_update_uri: Option<String>,
    pub noise_meter_active: bool,
    pub noise_db: Option<f64>,
    pub light_lux: Option<f32>,
    pub heart_rate_bpm: Option<u32>,
    pub step_count: Option<i64>,
}

/// External collaborators of one screen.
#[derive(Clone)]
pub struct DashboardDeps {
    pub clock: Arc<dyn Clock>,
    pub health: Arc<dyn HealthService>,
    pub sensors: Arc<dyn SensorService>,
    pub runtime: Handle,
}

#[derive(Debug, Clone, Copy, Default)]
struct Readings {
    noise: Option<NoiseSample>,
    heart_rate_bpm: Option<u32>,
    step_count: Option<i64>,
}

pub struct Dashboard {
    id: Uuid,
    config: DashboardConfig,
    clock: Arc<dyn Clock>,
    sensors: Arc<dyn SensorService>,
    runtime: Handle,
    bridge: HealthBridge,
    stopwatch: Stopwatch,
    light: LightSampler,
    view: DashboardView,
    readings: Readings,
    microphone: PermissionFlow,
    health_permission: PermissionFlow,
    health_availability: HealthAvailability,
    ticker: Option<PeriodicTask>,
    health_poll: Option<PeriodicTask>,
    noise_meter: Option<PeriodicTask>,
    scope: ScreenScope,
    sender: UnboundedSender<DashboardMessage>,
    receiver: UnboundedReceiver<DashboardMessage>,
    closed: bool,
}

impl Dashboard {
    /// Builds an unopened screen. Nothing runs until `open`/`start`.
    pub fn new(config: DashboardConfig, deps: DashboardDeps) -> Result<Self, ConfigError> {
        config.validate()?;
        let (sender, receiver) = unbounded_channel();
        let bridge = HealthBridge::new(
            deps.health,
            config.health_window_secs,
            config.start_probe_window_secs,
        );
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            clock: deps.clock,
            sensors: deps.sensors,
            scope: ScreenScope::new(deps.runtime.clone()),
            runtime: deps.runtime,
            bridge,
            stopwatch: Stopwatch::new(),
            light: LightSampler::new(),
            view: DashboardView::default(),
            readings: Readings::default(),
            microphone: PermissionFlow::new("microphone"),
            health_permission: PermissionFlow::new("health"),
            health_availability: HealthAvailability::Unavailable,
            ticker: None,
            health_poll: None,
            noise_meter: None,
            sender,
            receiver,
            closed: false,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn bridge(&self) -> &HealthBridge {
        &self.bridge
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Registers the light listener and checks health provider status.
    pub fn open(&mut self) -> DashboardResult<HealthAvailability> {
        self.ensure_open()?;
        if let Err(err) = self.sensors.register_listener(SensorKind::Light) {
            warn!(
                "event=sensor_register module=dashboard status=error session={} error={err}",
                self.id
            );
        }
        self.refresh_health_availability()
    }

    /// Re-reads provider status, e.g. after the user returns from the
    /// provider's store page.
    pub fn refresh_health_availability(&mut self) -> DashboardResult<HealthAvailability> {
        self.ensure_open()?;
        self.health_availability = self.bridge.service().availability();
        match self.health_availability {
            HealthAvailability::Available => info!(
                "event=health_availability module=dashboard status=ok session={} health=available",
                self.id
            ),
            other => warn!(
                "event=health_availability module=dashboard status=skipped session={} health={}",
                self.id,
                other.as_str()
            ),
        }
        Ok(self.health_availability)
    }

    /// Marks the microphone prompt as shown.
    pub fn request_microphone_permission(&mut self) -> DashboardResult<()> {
        self.ensure_open()?;
        self.microphone.request()?;
        Ok(())
    }

    pub fn on_microphone_permission_result(&mut self, granted: bool) -> DashboardResult<PermissionState> {
        self.ensure_open()?;
        let state = self.microphone.resolve(granted)?;
        info!(
            "event=permission_result module=dashboard status=ok session={} scope=microphone state={}",
            self.id,
            state.as_str()
        );
        Ok(state)
    }

    /// Records a microphone grant that existed before the screen opened.
    pub fn record_microphone_granted(&mut self) {
        self.microphone.record_existing_grant();
    }

    /// Marks the health prompt as shown and returns the permissions to ask
    /// for. Fails unless the provider is available.
    pub fn request_health_permissions(&mut self) -> DashboardResult<&'static [HealthPermission]> {
        self.ensure_open()?;
        if self.health_availability != HealthAvailability::Available {
            return Err(HealthError::Unavailable.into());
        }
        self.health_permission.request()?;
        Ok(&REQUIRED_HEALTH_PERMISSIONS)
    }

    /// Applies the health prompt outcome. All required permissions must be
    /// granted for the scope to become `Granted`.
    pub fn on_health_permissions_result(
        &mut self,
        results: &[(HealthPermission, bool)],
    ) -> DashboardResult<PermissionState> {
        self.ensure_open()?;
        let granted = all_health_permissions_granted(results);
        let state = self.health_permission.resolve(granted)?;
        if granted {
            info!(
                "event=permission_result module=dashboard status=ok session={} scope=health state=granted",
                self.id
            );
            self.seed_heart_rate();
            if self.stopwatch.is_running() {
                self.spawn_health_poll();
            }
        } else {
            warn!(
                "event=permission_result module=dashboard status=error session={} scope=health state=denied",
                self.id
            );
        }
        Ok(state)
    }

    /// Starts capture and the 1 s loudness loop. Capture failure disables
    /// the meter for this screen; there is no retry.
    pub fn start_noise_meter(&mut self, source: Box<dyn AudioSource>) -> DashboardResult<()> {
        self.ensure_open()?;
        if self.noise_meter.is_some() {
            return Err(NoiseError::AlreadyActive.into());
        }
        if !self.microphone.is_granted() {
            warn!(
                "event=noise_start module=dashboard status=skipped session={} reason=permission",
                self.id
            );
            return Err(NoiseError::PermissionNotGranted.into());
        }
        let mut sampler = match NoiseSampler::start(
            source,
            self.config.audio_buffer_samples,
            self.config.noise_floor,
        ) {
            Ok(sampler) => sampler,
            Err(err) => {
                warn!(
                    "event=noise_start module=dashboard status=error session={} error={err}",
                    self.id
                );
                return Err(NoiseError::from(err).into());
            }
        };
        let sender = self.sender.clone();
        self.noise_meter = Some(PeriodicTask::spawn(
            &self.runtime,
            "noise_meter",
            self.config.noise_interval(),
            move || {
                let control = match sample_or_log(&mut sampler) {
                    Some(sample) => send_or_stop(&sender, DashboardMessage::Noise(sample)),
                    None => TaskControl::Continue,
                };
                ready(control)
            },
        ));
        info!(
            "event=noise_start module=dashboard status=ok session={} sample_rate_hz={}",
            self.id, self.config.audio_sample_rate_hz
        );
        Ok(())
    }

    pub fn is_noise_meter_active(&self) -> bool {
        self.noise_meter
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn start(&mut self) -> DashboardResult<()> {
        self.ensure_open()?;
        let now = self.clock.now_epoch_ms();
        if let Err(err) = self.stopwatch.start(now) {
            warn!(
                "event=stopwatch_start module=dashboard status=error session={} error={err}",
                self.id
            );
            return Err(err.into());
        }
        self.on_started(now);
        Ok(())
    }

    pub fn stop(&mut self) -> DashboardResult<()> {
        self.ensure_open()?;
        let now = self.clock.now_epoch_ms();
        if let Err(err) = self.stopwatch.stop(now) {
            warn!(
                "event=stopwatch_stop module=dashboard status=error session={} error={err}",
                self.id
            );
            return Err(err.into());
        }
        self.on_stopped(now);
        Ok(())
    }

    pub fn lap(&mut self) -> DashboardResult<LapRecord> {
        self.ensure_open()?;
        let record = self.stopwatch.lap(self.clock.now_epoch_ms())?;
        self.refresh_laps();
        debug!(
            "event=stopwatch_lap module=dashboard status=ok session={} lap={}",
            self.id, record.index
        );
        Ok(record)
    }

    pub fn reset(&mut self) -> DashboardResult<()> {
        self.ensure_open()?;
        self.stopwatch.reset()?;
        self.on_reset();
        Ok(())
    }

    /// Single start/stop button.
    pub fn press_start_stop(&mut self) -> DashboardResult<StartStopOutcome> {
        self.ensure_open()?;
        let now = self.clock.now_epoch_ms();
        let outcome = self.stopwatch.press_start_stop(now);
        match outcome {
            StartStopOutcome::Started => self.on_started(now),
            StartStopOutcome::Stopped => self.on_stopped(now),
        }
        Ok(outcome)
    }

    /// Single lap/reset button: lap while running, reset otherwise.
    pub fn press_lap_or_reset(&mut self) -> DashboardResult<LapButtonOutcome> {
        self.ensure_open()?;
        let outcome = self.stopwatch.press_lap_or_reset(self.clock.now_epoch_ms());
        match &outcome {
            LapButtonOutcome::Lapped(_) => self.refresh_laps(),
            LapButtonOutcome::Reset => self.on_reset(),
        }
        Ok(outcome)
    }

    pub fn on_sensor_changed(&mut self, event: &SensorEvent) {
        if self.closed {
            return;
        }
        if let Some(sample) = self.light.on_sensor_changed(event) {
            self.view.light_text = light_text(Some(sample.lux));
        }
    }

    pub fn on_accuracy_changed(&mut self, kind: SensorKind, accuracy: i32) {
        debug!(
            "event=sensor_accuracy module=dashboard status=ok session={} kind={kind:?} accuracy={accuracy}",
            self.id
        );
    }

    /// Applies every queued task result. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.apply(message);
            applied += 1;
        }
        applied
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let running = self.stopwatch.is_running();
        DashboardSnapshot {
            session_id: self.id.to_string(),
            view: self.view.clone(),
            phase: self.stopwatch.phase(),
            start_stop_label: if running { "Stop" } else { "Start" }.to_string(),
            lap_button_label: if running { "Lap" } else { "Reset" }.to_string(),
            lap_enabled: running,
            reset_enabled: !running,
            microphone_permission: self.microphone.state(),
            health_permission: self.health_permission.state(),
            health_availability: self.health_availability,
            provider_update_uri: (self.health_availability
                == HealthAvailability::ProviderUpdateRequired)
                .then(provider_onboarding_uri),
            noise_meter_active: self.is_noise_meter_active(),
            noise_db: self.readings.noise.map(|sample| sample.decibel_level),
            light_lux: self.light.latest().map(|sample| sample.lux),
            heart_rate_bpm: self.readings.heart_rate_bpm,
            step_count: self.readings.step_count,
        }
    }

    /// Cancels every task, releases the microphone and unregisters sensors.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.ticker = None;
        self.health_poll = None;
        self.noise_meter = None;
        self.scope.cancel_all();
        self.sensors.unregister_all();
        info!(
            "event=dashboard_close module=dashboard status=ok session={} laps={}",
            self.id,
            self.stopwatch.laps().len()
        );
    }

    fn ensure_open(&self) -> DashboardResult<()> {
        if self.closed {
            return Err(DashboardError::Closed);
        }
        Ok(())
    }

    fn on_started(&mut self, now: i64) {
        self.view.time_text = self.stopwatch.display_text(now);
        let sender = self.sender.clone();
        self.ticker = Some(PeriodicTask::spawn(
            &self.runtime,
            "stopwatch_tick",
            self.config.tick_interval(),
            move || ready(send_or_stop(&sender, DashboardMessage::Tick)),
        ));

        if self.health_permission.is_granted() {
            self.spawn_health_poll();
            let bridge = self.bridge.clone();
            let sender = self.sender.clone();
            self.scope.launch(async move {
                let probe = run_health_call("probe", move || bridge.probe_on_start(now)).await;
                if let Some(probe) = probe {
                    let _ = sender.send(DashboardMessage::StartProbe(probe));
                }
            });
        } else {
            debug!(
                "event=health_poll module=dashboard status=skipped session={} reason=permission",
                self.id
            );
        }
        info!(
            "event=stopwatch_start module=dashboard status=ok session={} offset_ms={}",
            self.id,
            self.stopwatch.state().paused_offset_ms
        );
    }

    fn on_stopped(&mut self, now: i64) {
        self.ticker = None;
        self.health_poll = None;
        self.view.time_text = self.stopwatch.display_text(now);
        info!(
            "event=stopwatch_stop module=dashboard status=ok session={} elapsed_ms={}",
            self.id,
            self.stopwatch.elapsed_ms(now)
        );
    }

    fn on_reset(&mut self) {
        self.view.time_text = DEFAULT_TIME_TEXT.to_string();
        self.view.laps.clear();
        info!(
            "event=stopwatch_reset module=dashboard status=ok session={}",
            self.id
        );
    }

    fn refresh_laps(&mut self) {
        self.view.laps = self.stopwatch.laps().iter().map(LapRecord::label).collect();
    }

    fn spawn_health_poll(&mut self) {
        if self.health_poll.is_some() {
            return;
        }
        let bridge = self.bridge.clone();
        let clock = Arc::clone(&self.clock);
        let sender = self.sender.clone();
        self.health_poll = Some(PeriodicTask::spawn(
            &self.runtime,
            "health_poll",
            self.config.health_poll_interval(),
            move || {
                let bridge = bridge.clone();
                let sender = sender.clone();
                let now = clock.now_epoch_ms();
                async move {
                    match run_health_call("poll", move || bridge.poll(now)).await {
                        Some(sample) => send_or_stop(&sender, DashboardMessage::Health(sample)),
                        None => TaskControl::Continue,
                    }
                }
            },
        ));
    }

    fn seed_heart_rate(&mut self) {
        let Some(bpm) = self.config.seed_heart_rate_bpm else {
            return;
        };
        let bridge = self.bridge.clone();
        let now = self.clock.now_epoch_ms();
        let zone_offset_secs = self.config.seed_zone_offset_secs;
        self.scope.launch(async move {
            let inserted = run_health_call("seed", move || {
                bridge.insert_seed_heart_rate(now, bpm, zone_offset_secs)
            })
            .await;
            if let Some(Err(err)) = inserted {
                warn!("event=health_insert module=dashboard status=error record=heart_rate error={err}");
            }
        });
    }

    fn apply(&mut self, message: DashboardMessage) {
        match message {
            DashboardMessage::Tick => {
                if self.stopwatch.is_running() {
                    self.view.time_text = self.stopwatch.display_text(self.clock.now_epoch_ms());
                }
            }
            DashboardMessage::Noise(sample) => {
                self.readings.noise = Some(sample);
                self.view.noise_text = noise_text(Some(sample.decibel_level));
            }
            DashboardMessage::Health(sample) => {
                if let Some(bpm) = sample.heart_rate_bpm {
                    self.show_heart_rate(bpm);
                }
                if let Some(steps) = sample.step_count {
                    self.readings.step_count = Some(steps);
                    self.view.step_count_text = step_count_text(Some(steps));
                }
            }
            DashboardMessage::StartProbe(probe) => {
                if let Some(bpm) = probe.heart_rate_bpm {
                    self.show_heart_rate(bpm);
                }
            }
        }
    }

    fn show_heart_rate(&mut self, bpm: u32) {
        self.readings.heart_rate_bpm = Some(bpm);
        self.view.heart_rate_text = heart_rate_text(Some(bpm));
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.close();
    }
}

/// Runs a health-service call on the blocking pool. `None` when the call
/// panicked or was cancelled.
async fn run_health_call<T, F>(call: &'static str, f: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match spawn_blocking(f).await {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("event=health_call module=dashboard status=error call={call} error={err}");
            None
        }
    }
}

fn send_or_stop(sender: &UnboundedSender<DashboardMessage>, message: DashboardMessage) -> TaskControl {
    match sender.send(message) {
        Ok(()) => TaskControl::Continue,
        Err(_) => TaskControl::Stop,
    }
}
