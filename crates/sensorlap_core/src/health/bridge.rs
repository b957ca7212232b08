//! Trailing-window health reads for the dashboard.
//!
//! # Responsibility
//! - Read the latest heart rate and the step total over trailing windows.
//! - Run the start-of-session probe (read plus logged aggregate).
//! - Insert records on behalf of the screen.
//!
//! # Invariants
//! - Poll failures are logged and reported as `None`; callers keep the value
//!   already displayed.
//! - Permission gating is the caller's job; the bridge never prompts.

use crate::health::service::{
    saturating_step_sum, AggregateMetric, AggregateValue, HealthResult, HealthService,
};
use crate::model::health_record::{HeartRateRecord, HeartRateSample, StepsRecord, TimeRange};
use crate::model::sample::HealthSample;
use log::{debug, info, warn};
use std::sync::Arc;

/// Length of the seed record inserted after permissions are granted.
pub const SEED_RECORD_DURATION_MS: i64 = 10_000;

/// Readings gathered when the stopwatch starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StartProbe {
    pub heart_rate_bpm: Option<u32>,
    /// Logged only, never displayed.
    pub average_heart_rate_bpm: Option<f64>,
}

#[derive(Clone)]
pub struct HealthBridge {
    service: Arc<dyn HealthService>,
    window_secs: u64,
    probe_window_secs: u64,
}

impl HealthBridge {
    pub fn new(service: Arc<dyn HealthService>, window_secs: u64, probe_window_secs: u64) -> Self {
        Self {
            service,
            window_secs,
            probe_window_secs,
        }
    }

    pub fn service(&self) -> &Arc<dyn HealthService> {
        &self.service
    }

    /// Most recent BPM sample across all records in `range`.
    pub fn latest_heart_rate(&self, range: TimeRange) -> HealthResult<Option<u32>> {
        let records = self.service.read_heart_rate(range)?;
        Ok(records
            .iter()
            .flat_map(|record| record.samples.iter())
            .max_by_key(|sample| sample.time_epoch_ms)
            .map(|sample| sample.beats_per_minute))
    }

    /// Sum of step records in `range`, saturating at `i64::MAX`.
    pub fn step_total(&self, range: TimeRange) -> HealthResult<i64> {
        let records = self.service.read_steps(range)?;
        Ok(saturating_step_sum(records.iter().map(|record| record.count)))
    }

    /// Reads both values over the trailing poll window.
    pub fn poll(&self, now_epoch_ms: i64) -> HealthSample {
        let range = TimeRange::trailing(now_epoch_ms, self.window_secs);
        let heart_rate_bpm = match self.latest_heart_rate(range) {
            Ok(bpm) => {
                if let Some(bpm) = bpm {
                    debug!("event=health_read module=health status=ok record=heart_rate bpm={bpm}");
                }
                bpm
            }
            Err(err) => {
                warn!("event=health_read module=health status=error record=heart_rate error={err}");
                None
            }
        };
        let step_count = match self.step_total(range) {
            Ok(total) => Some(total),
            Err(err) => {
                warn!("event=health_read module=health status=error record=steps error={err}");
                None
            }
        };
        HealthSample {
            heart_rate_bpm,
            step_count,
        }
    }

    /// Average BPM over `range`; `None` on no data or failure.
    pub fn average_heart_rate(&self, range: TimeRange) -> Option<f64> {
        match self.service.aggregate(AggregateMetric::HeartRateAvg, range) {
            Ok(Some(AggregateValue::Bpm(avg))) => Some(avg),
            Ok(Some(other)) => {
                warn!("event=health_aggregate module=health status=error metric=heart_rate_avg unexpected={other:?}");
                None
            }
            Ok(None) => None,
            Err(err) => {
                warn!("event=health_aggregate module=health status=error metric=heart_rate_avg error={err}");
                None
            }
        }
    }

    /// Aggregate step total over `range`; `0` on no data or failure.
    pub fn total_steps(&self, range: TimeRange) -> i64 {
        match self.service.aggregate(AggregateMetric::StepsTotal, range) {
            Ok(Some(AggregateValue::Count(total))) => total,
            Ok(Some(other)) => {
                warn!("event=health_aggregate module=health status=error metric=steps_total unexpected={other:?}");
                0
            }
            Ok(None) => 0,
            Err(err) => {
                warn!("event=health_aggregate module=health status=error metric=steps_total error={err}");
                0
            }
        }
    }

    /// Heart rate read plus aggregate over the probe window.
    pub fn probe_on_start(&self, now_epoch_ms: i64) -> StartProbe {
        let range = TimeRange::trailing(now_epoch_ms, self.probe_window_secs);
        let heart_rate_bpm = match self.latest_heart_rate(range) {
            Ok(bpm) => bpm,
            Err(err) => {
                warn!("event=health_probe module=health status=error record=heart_rate error={err}");
                None
            }
        };
        let average_heart_rate_bpm = self.average_heart_rate(range);
        match average_heart_rate_bpm {
            Some(avg) => info!(
                "event=health_probe module=health status=ok window_secs={} avg_bpm={avg:.1}",
                self.probe_window_secs
            ),
            None => info!(
                "event=health_probe module=health status=ok window_secs={} avg_bpm=none",
                self.probe_window_secs
            ),
        }
        StartProbe {
            heart_rate_bpm,
            average_heart_rate_bpm,
        }
    }

    pub fn insert_heart_rate(&self, record: HeartRateRecord) -> HealthResult<()> {
        record.validate()?;
        self.service.insert_heart_rate(std::slice::from_ref(&record))?;
        info!(
            "event=health_insert module=health status=ok record=heart_rate samples={}",
            record.samples.len()
        );
        Ok(())
    }

    pub fn insert_steps(&self, record: StepsRecord) -> HealthResult<()> {
        record.validate()?;
        self.service.insert_steps(std::slice::from_ref(&record))?;
        info!(
            "event=health_insert module=health status=ok record=steps count={}",
            record.count
        );
        Ok(())
    }

    /// Inserts one sample record spanning `now..now + 10s`.
    pub fn insert_seed_heart_rate(
        &self,
        now_epoch_ms: i64,
        beats_per_minute: u32,
        zone_offset_secs: Option<i32>,
    ) -> HealthResult<()> {
        self.insert_heart_rate(HeartRateRecord {
            start_epoch_ms: now_epoch_ms,
            end_epoch_ms: now_epoch_ms + SEED_RECORD_DURATION_MS,
            start_zone_offset_secs: zone_offset_secs,
            end_zone_offset_secs: zone_offset_secs,
            samples: vec![HeartRateSample {
                time_epoch_ms: now_epoch_ms,
                beats_per_minute,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::HealthBridge;
    use crate::health::buffered::BufferedHealthService;
    use crate::health::service::{
        AggregateMetric, AggregateValue, HealthAvailability, HealthError, HealthResult,
        HealthService,
    };
    use crate::model::health_record::{
        HealthRecordValidationError, HeartRateRecord, HeartRateSample, StepsRecord, TimeRange,
    };
    use crate::runtime::clock::ManualClock;
    use std::sync::Arc;

    const NOW: i64 = 1_700_000_000_000;

    fn bridge() -> (Arc<BufferedHealthService>, HealthBridge) {
        let clock = Arc::new(ManualClock::new(NOW));
        let service = Arc::new(BufferedHealthService::new(clock, 3_600));
        let bridge = HealthBridge::new(service.clone(), 10, 60);
        (service, bridge)
    }

    fn heart(samples: &[(i64, u32)]) -> HeartRateRecord {
        let start = samples.iter().map(|s| s.0).min().unwrap_or(NOW);
        let end = samples.iter().map(|s| s.0).max().unwrap_or(NOW);
        HeartRateRecord {
            start_epoch_ms: start,
            end_epoch_ms: end,
            start_zone_offset_secs: None,
            end_zone_offset_secs: None,
            samples: samples
                .iter()
                .map(|&(time_epoch_ms, beats_per_minute)| HeartRateSample {
                    time_epoch_ms,
                    beats_per_minute,
                })
                .collect(),
        }
    }

    fn steps(start: i64, end: i64, count: i64) -> StepsRecord {
        StepsRecord {
            start_epoch_ms: start,
            end_epoch_ms: end,
            start_zone_offset_secs: None,
            end_zone_offset_secs: None,
            count,
        }
    }

    #[test]
    fn poll_reports_latest_bpm_and_step_sum() {
        let (service, bridge) = bridge();
        service
            .insert_heart_rate(&[heart(&[(NOW - 8_000, 88)]), heart(&[(NOW - 2_000, 95), (NOW - 5_000, 70)])])
            .expect("insert heart");
        service
            .insert_steps(&[steps(NOW - 9_000, NOW - 6_000, 10), steps(NOW - 4_000, NOW - 1_000, 5)])
            .expect("insert steps");

        let sample = bridge.poll(NOW);
        assert_eq!(sample.heart_rate_bpm, Some(95));
        assert_eq!(sample.step_count, Some(15));
    }

    #[test]
    fn empty_window_reports_zero_steps_and_no_bpm() {
        let (_service, bridge) = bridge();
        let sample = bridge.poll(NOW);
        assert_eq!(sample.heart_rate_bpm, None);
        assert_eq!(sample.step_count, Some(0));
    }

    #[test]
    fn failing_service_reports_nothing() {
        let (service, bridge) = bridge();
        service.set_failure(Some("remote exception".to_string()));
        let sample = bridge.poll(NOW);
        assert_eq!(sample.heart_rate_bpm, None);
        assert_eq!(sample.step_count, None);
        assert_eq!(bridge.total_steps(TimeRange::trailing(NOW, 60)), 0);
    }

    #[test]
    fn probe_uses_wider_window() {
        let (service, bridge) = bridge();
        service
            .insert_heart_rate(&[heart(&[(NOW - 50_000, 60), (NOW - 40_000, 80)])])
            .expect("insert");
        let probe = bridge.probe_on_start(NOW);
        assert_eq!(probe.heart_rate_bpm, Some(80));
        assert_eq!(probe.average_heart_rate_bpm, Some(70.0));
        assert_eq!(bridge.poll(NOW).heart_rate_bpm, None);
    }

    #[test]
    fn seed_record_spans_ten_seconds() {
        let (service, bridge) = bridge();
        bridge
            .insert_seed_heart_rate(NOW, 120, Some(9 * 3_600))
            .expect("seed insert");
        let records = service
            .read_heart_rate(TimeRange::between(NOW, NOW + 1))
            .expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].end_epoch_ms - records[0].start_epoch_ms, 10_000);
        assert_eq!(records[0].start_zone_offset_secs, Some(32_400));
    }

    #[test]
    fn insert_validates_before_calling_service() {
        let (service, bridge) = bridge();
        let err = bridge
            .insert_steps(steps(NOW, NOW - 1, 3))
            .expect_err("reversed interval");
        assert!(matches!(err, HealthError::Validation(_)));
        assert_eq!(service.buffered_counts(), (0, 0));
    }

    #[test]
    fn oversized_step_record_is_rejected() {
        let (service, bridge) = bridge();
        let err = bridge
            .insert_steps(steps(NOW - 5_000, NOW - 4_000, i64::MAX))
            .expect_err("count above broker limit");
        assert_eq!(
            err,
            HealthError::Validation(HealthRecordValidationError::StepCountTooLarge(i64::MAX))
        );
        assert_eq!(service.buffered_counts(), (0, 0));
    }

    /// Broker returning records that skipped local validation.
    struct HugeSteps;

    impl HealthService for HugeSteps {
        fn availability(&self) -> HealthAvailability {
            HealthAvailability::Available
        }

        fn read_heart_rate(&self, _range: TimeRange) -> HealthResult<Vec<HeartRateRecord>> {
            Ok(Vec::new())
        }

        fn read_steps(&self, _range: TimeRange) -> HealthResult<Vec<StepsRecord>> {
            Ok(vec![
                steps(NOW - 5_000, NOW - 4_000, i64::MAX),
                steps(NOW - 3_000, NOW - 2_000, 1),
            ])
        }

        fn aggregate(
            &self,
            _metric: AggregateMetric,
            _range: TimeRange,
        ) -> HealthResult<Option<AggregateValue>> {
            Ok(None)
        }

        fn insert_heart_rate(&self, _records: &[HeartRateRecord]) -> HealthResult<()> {
            Ok(())
        }

        fn insert_steps(&self, _records: &[StepsRecord]) -> HealthResult<()> {
            Ok(())
        }
    }

    #[test]
    fn step_sum_saturates_instead_of_overflowing() {
        let bridge = HealthBridge::new(Arc::new(HugeSteps), 10, 60);
        assert_eq!(bridge.poll(NOW).step_count, Some(i64::MAX));
    }
}
