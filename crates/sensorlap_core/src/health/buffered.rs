//! Push-fed `HealthService` backed by in-process buffers.
//!
//! The platform shell reads the real broker and pushes what it got through
//! `insert_*`; the bridge then reads it back with the usual range filters.
//!
//! # Invariants
//! - Only validated records are buffered.
//! - Records whose end is older than the retention window are pruned on
//!   every insert.

use crate::model::health_record::{HeartRateRecord, StepsRecord, TimeRange};
use crate::health::service::{
    saturating_step_sum, AggregateMetric, AggregateValue, HealthAvailability, HealthError,
    HealthResult, HealthService,
};
use crate::runtime::clock::Clock;
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Buffers {
    availability: HealthAvailability,
    heart_rate: Vec<HeartRateRecord>,
    steps: Vec<StepsRecord>,
    failure: Option<String>,
}

pub struct BufferedHealthService {
    clock: Arc<dyn Clock>,
    retention_ms: i64,
    buffers: Mutex<Buffers>,
}

impl BufferedHealthService {
    pub fn new(clock: Arc<dyn Clock>, retention_secs: u64) -> Self {
        Self {
            clock,
            retention_ms: i64::try_from(retention_secs.saturating_mul(1_000)).unwrap_or(i64::MAX),
            buffers: Mutex::new(Buffers {
                availability: HealthAvailability::Available,
                ..Buffers::default()
            }),
        }
    }

    pub fn set_availability(&self, availability: HealthAvailability) {
        self.lock().availability = availability;
    }

    /// Makes every subsequent call fail with `message`, or clears the
    /// failure when `None`. Mirrors a broker that throws.
    pub fn set_failure(&self, message: Option<String>) {
        self.lock().failure = message;
    }

    /// Number of buffered heart-rate and step records.
    pub fn buffered_counts(&self) -> (usize, usize) {
        let buffers = self.lock();
        (buffers.heart_rate.len(), buffers.steps.len())
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checked(&self) -> HealthResult<MutexGuard<'_, Buffers>> {
        let buffers = self.lock();
        if let Some(message) = &buffers.failure {
            return Err(HealthError::Service(message.clone()));
        }
        if buffers.availability != HealthAvailability::Available {
            return Err(HealthError::Unavailable);
        }
        Ok(buffers)
    }

    fn prune(&self, buffers: &mut Buffers) {
        let cutoff = self.clock.now_epoch_ms().saturating_sub(self.retention_ms);
        let before = buffers.heart_rate.len() + buffers.steps.len();
        buffers.heart_rate.retain(|record| record.end_epoch_ms >= cutoff);
        buffers.steps.retain(|record| record.end_epoch_ms >= cutoff);
        let pruned = before - (buffers.heart_rate.len() + buffers.steps.len());
        if pruned > 0 {
            debug!("event=health_buffer_prune module=health status=ok pruned={pruned}");
        }
    }
}

impl HealthService for BufferedHealthService {
    fn availability(&self) -> HealthAvailability {
        self.lock().availability
    }

    fn read_heart_rate(&self, range: TimeRange) -> HealthResult<Vec<HeartRateRecord>> {
        let buffers = self.checked()?;
        Ok(buffers
            .heart_rate
            .iter()
            .filter(|record| range.overlaps(record.start_epoch_ms, record.end_epoch_ms))
            .cloned()
            .collect())
    }

    fn read_steps(&self, range: TimeRange) -> HealthResult<Vec<StepsRecord>> {
        let buffers = self.checked()?;
        Ok(buffers
            .steps
            .iter()
            .filter(|record| range.overlaps(record.start_epoch_ms, record.end_epoch_ms))
            .cloned()
            .collect())
    }

    fn aggregate(
        &self,
        metric: AggregateMetric,
        range: TimeRange,
    ) -> HealthResult<Option<AggregateValue>> {
        let buffers = self.checked()?;
        match metric {
            AggregateMetric::HeartRateAvg => {
                let (sum, count) = buffers
                    .heart_rate
                    .iter()
                    .flat_map(|record| record.samples.iter())
                    .filter(|sample| range.contains(sample.time_epoch_ms))
                    .fold((0_u64, 0_u64), |(sum, count), sample| {
                        (sum + u64::from(sample.beats_per_minute), count + 1)
                    });
                if count == 0 {
                    return Ok(None);
                }
                Ok(Some(AggregateValue::Bpm(sum as f64 / count as f64)))
            }
            AggregateMetric::StepsTotal => {
                let mut matched = buffers
                    .steps
                    .iter()
                    .filter(|record| range.overlaps(record.start_epoch_ms, record.end_epoch_ms))
                    .peekable();
                if matched.peek().is_none() {
                    return Ok(None);
                }
                Ok(Some(AggregateValue::Count(saturating_step_sum(
                    matched.map(|record| record.count),
                ))))
            }
        }
    }

    fn insert_heart_rate(&self, records: &[HeartRateRecord]) -> HealthResult<()> {
        for record in records {
            record.validate()?;
        }
        let mut buffers = self.checked()?;
        buffers.heart_rate.extend(records.iter().cloned());
        self.prune(&mut buffers);
        Ok(())
    }

    fn insert_steps(&self, records: &[StepsRecord]) -> HealthResult<()> {
        for record in records {
            record.validate()?;
        }
        let mut buffers = self.checked()?;
        buffers.steps.extend(records.iter().cloned());
        self.prune(&mut buffers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BufferedHealthService;
    use crate::health::service::{
        AggregateMetric, AggregateValue, HealthAvailability, HealthError, HealthService,
    };
    use crate::model::health_record::{HeartRateRecord, HeartRateSample, StepsRecord, TimeRange};
    use crate::runtime::clock::ManualClock;
    use std::sync::Arc;

    fn heart(time: i64, bpm: u32) -> HeartRateRecord {
        HeartRateRecord {
            start_epoch_ms: time,
            end_epoch_ms: time,
            start_zone_offset_secs: None,
            end_zone_offset_secs: None,
            samples: vec![HeartRateSample {
                time_epoch_ms: time,
                beats_per_minute: bpm,
            }],
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

    fn buffered(now: i64) -> (Arc<ManualClock>, BufferedHealthService) {
        let clock = Arc::new(ManualClock::new(now));
        let service = BufferedHealthService::new(clock.clone(), 3_600);
        (clock, service)
    }

    #[test]
    fn reads_filter_by_range() {
        let (_clock, service) = buffered(100_000);
        service
            .insert_heart_rate(&[heart(80_000, 70), heart(95_000, 90)])
            .expect("insert");
        let records = service
            .read_heart_rate(TimeRange::trailing(100_000, 10))
            .expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].samples[0].beats_per_minute, 90);
    }

    #[test]
    fn aggregates_average_and_total() {
        let (_clock, service) = buffered(100_000);
        service
            .insert_heart_rate(&[heart(91_000, 60), heart(99_000, 90)])
            .expect("insert heart");
        service
            .insert_steps(&[steps(90_000, 95_000, 12), steps(95_000, 99_000, 30)])
            .expect("insert steps");
        let range = TimeRange::trailing(100_000, 60);

        assert_eq!(
            service.aggregate(AggregateMetric::HeartRateAvg, range),
            Ok(Some(AggregateValue::Bpm(75.0)))
        );
        assert_eq!(
            service.aggregate(AggregateMetric::StepsTotal, range),
            Ok(Some(AggregateValue::Count(42)))
        );
        assert_eq!(
            service.aggregate(AggregateMetric::StepsTotal, TimeRange::between(0, 1_000)),
            Ok(None)
        );
    }

    #[test]
    fn invalid_records_are_rejected_whole() {
        let (_clock, service) = buffered(100_000);
        let err = service
            .insert_heart_rate(&[heart(99_000, 80), heart(99_500, 0)])
            .expect_err("bpm 0 is invalid");
        assert!(matches!(err, HealthError::Validation(_)));
        assert_eq!(service.buffered_counts(), (0, 0));
    }

    #[test]
    fn old_records_are_pruned_on_insert() {
        let (clock, service) = buffered(0);
        service.insert_steps(&[steps(0, 1_000, 5)]).expect("insert");
        clock.set(3_600_000 + 2_000);
        service
            .insert_steps(&[steps(3_600_000, 3_601_000, 7)])
            .expect("insert later");
        assert_eq!(service.buffered_counts(), (0, 1));
    }

    #[test]
    fn unavailable_or_failing_service_errors() {
        let (_clock, service) = buffered(0);
        service.set_availability(HealthAvailability::ProviderUpdateRequired);
        assert_eq!(
            service.read_steps(TimeRange::between(0, 1)),
            Err(HealthError::Unavailable)
        );

        service.set_availability(HealthAvailability::Available);
        service.set_failure(Some("binder died".to_string()));
        assert_eq!(
            service.read_steps(TimeRange::between(0, 1)),
            Err(HealthError::Service("binder died".to_string()))
        );
    }
}
