//! Health service contract.

use crate::model::health_record::{
    HealthRecordValidationError, HeartRateRecord, StepsRecord, TimeRange,
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Package id of the platform health-data provider.
pub const HEALTH_PROVIDER_PACKAGE: &str = "com.google.android.apps.healthdata";

pub type HealthResult<T> = Result<T, HealthError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthError {
    PermissionNotGranted,
    Unavailable,
    Validation(HealthRecordValidationError),
    Service(String),
}

impl Display for HealthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionNotGranted => write!(f, "health permissions not granted"),
            Self::Unavailable => write!(f, "health service unavailable"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Service(message) => write!(f, "health service error: {message}"),
        }
    }
}

impl Error for HealthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HealthRecordValidationError> for HealthError {
    fn from(value: HealthRecordValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Provider SDK status on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthAvailability {
    #[default]
    Unavailable,
    /// Installed but too old; the user must update it first.
    ProviderUpdateRequired,
    Available,
}

impl HealthAvailability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::ProviderUpdateRequired => "provider_update_required",
            Self::Available => "available",
        }
    }
}

/// Store URI that opens the provider's onboarding page.
pub fn provider_onboarding_uri() -> String {
    format!(
        "market://details?id={HEALTH_PROVIDER_PACKAGE}&url=healthconnect%3A%2F%2Fonboarding"
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMetric {
    HeartRateAvg,
    StepsTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateValue {
    Bpm(f64),
    Count(i64),
}

/// Adds step counts, saturating at `i64::MAX` instead of overflowing.
pub fn saturating_step_sum(counts: impl IntoIterator<Item = i64>) -> i64 {
    let mut total: i64 = 0;
    for count in counts {
        match total.checked_add(count) {
            Some(next) => total = next,
            None => {
                warn!("event=health_step_sum module=health status=error reason=overflow");
                return if count < 0 { i64::MIN } else { i64::MAX };
            }
        }
    }
    total
}

/// Platform health-data broker.
///
/// Calls may block. The dashboard runs them on tokio's blocking pool, so a
/// slow call delays only the next health poll.
pub trait HealthService: Send + Sync {
    fn availability(&self) -> HealthAvailability;

    fn read_heart_rate(&self, range: TimeRange) -> HealthResult<Vec<HeartRateRecord>>;

    fn read_steps(&self, range: TimeRange) -> HealthResult<Vec<StepsRecord>>;

    /// `Ok(None)` when the range holds no data for `metric`.
    fn aggregate(
        &self,
        metric: AggregateMetric,
        range: TimeRange,
    ) -> HealthResult<Option<AggregateValue>>;

    fn insert_heart_rate(&self, records: &[HeartRateRecord]) -> HealthResult<()>;

    fn insert_steps(&self, records: &[StepsRecord]) -> HealthResult<()>;
}
