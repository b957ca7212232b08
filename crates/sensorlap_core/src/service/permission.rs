//! Runtime permission state machines.
//!
//! # Responsibility
//! - Track each permission scope through `Unchecked -> Requested ->
//!   Granted | Denied`.
//! - Describe the health-data permission set the bridge depends on.
//!
//! # Invariants
//! - A result is only accepted for a scope that is `Requested`.
//! - Data calls for a scope are allowed only in `Granted`.
//! - A denied scope may be requested again.

use crate::model::health_record::HealthRecordType;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    #[default]
    Unchecked,
    Requested,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Requested => "requested",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    AlreadyRequested { scope: &'static str },
    AlreadyGranted { scope: &'static str },
    NotRequested { scope: &'static str },
}

impl Display for PermissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRequested { scope } => {
                write!(f, "{scope} permission request already pending")
            }
            Self::AlreadyGranted { scope } => write!(f, "{scope} permission already granted"),
            Self::NotRequested { scope } => {
                write!(f, "{scope} permission result arrived without a request")
            }
        }
    }
}

impl Error for PermissionError {}

/// One permission scope and its current state.
#[derive(Debug, Clone)]
pub struct PermissionFlow {
    scope: &'static str,
    state: PermissionState,
}

impl PermissionFlow {
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            state: PermissionState::Unchecked,
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    pub fn is_granted(&self) -> bool {
        self.state == PermissionState::Granted
    }

    /// Marks the prompt as shown.
    pub fn request(&mut self) -> Result<(), PermissionError> {
        match self.state {
            PermissionState::Unchecked | PermissionState::Denied => {
                self.state = PermissionState::Requested;
                Ok(())
            }
            PermissionState::Requested => Err(PermissionError::AlreadyRequested { scope: self.scope }),
            PermissionState::Granted => Err(PermissionError::AlreadyGranted { scope: self.scope }),
        }
    }

    /// Applies the prompt outcome.
    pub fn resolve(&mut self, granted: bool) -> Result<PermissionState, PermissionError> {
        if self.state != PermissionState::Requested {
            return Err(PermissionError::NotRequested { scope: self.scope });
        }
        self.state = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        Ok(self.state)
    }

    /// Records a grant that already existed before any prompt.
    pub fn record_existing_grant(&mut self) {
        self.state = PermissionState::Granted;
    }
}

/// Read or write access to one health record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealthPermission {
    pub record_type: HealthRecordType,
    pub write: bool,
}

impl HealthPermission {
    pub const fn read(record_type: HealthRecordType) -> Self {
        Self {
            record_type,
            write: false,
        }
    }

    pub const fn write(record_type: HealthRecordType) -> Self {
        Self {
            record_type,
            write: true,
        }
    }

    /// Platform permission string, e.g. `android.permission.health.READ_HEART_RATE`.
    pub fn platform_name(&self) -> &'static str {
        match (self.write, self.record_type) {
            (false, HealthRecordType::HeartRate) => "android.permission.health.READ_HEART_RATE",
            (true, HealthRecordType::HeartRate) => "android.permission.health.WRITE_HEART_RATE",
            (false, HealthRecordType::Steps) => "android.permission.health.READ_STEPS",
            (true, HealthRecordType::Steps) => "android.permission.health.WRITE_STEPS",
        }
    }
}

/// Permissions the health bridge requests as one batch.
pub const REQUIRED_HEALTH_PERMISSIONS: [HealthPermission; 4] = [
    HealthPermission::read(HealthRecordType::HeartRate),
    HealthPermission::write(HealthRecordType::HeartRate),
    HealthPermission::read(HealthRecordType::Steps),
    HealthPermission::write(HealthRecordType::Steps),
];

/// True when every required health permission appears as granted.
pub fn all_health_permissions_granted(results: &[(HealthPermission, bool)]) -> bool {
    REQUIRED_HEALTH_PERMISSIONS.iter().all(|required| {
        results
            .iter()
            .any(|(permission, granted)| permission == required && *granted)
    })
}

#[cfg(test)]
mod tests {
    use super::{
        all_health_permissions_granted, HealthPermission, PermissionError, PermissionFlow,
        PermissionState, REQUIRED_HEALTH_PERMISSIONS,
    };
    use crate::model::health_record::HealthRecordType;

    #[test]
    fn request_then_grant() {
        let mut flow = PermissionFlow::new("microphone");
        flow.request().expect("request");
        assert_eq!(flow.state(), PermissionState::Requested);
        assert_eq!(flow.resolve(true), Ok(PermissionState::Granted));
        assert!(flow.is_granted());
    }

    #[test]
    fn result_without_request_is_rejected() {
        let mut flow = PermissionFlow::new("health");
        assert_eq!(
            flow.resolve(true),
            Err(PermissionError::NotRequested { scope: "health" })
        );
        assert_eq!(flow.state(), PermissionState::Unchecked);
    }

    #[test]
    fn denied_scope_can_be_requested_again() {
        let mut flow = PermissionFlow::new("health");
        flow.request().expect("request");
        flow.resolve(false).expect("deny");
        assert_eq!(flow.state(), PermissionState::Denied);
        flow.request().expect("second request");
        assert_eq!(
            flow.request(),
            Err(PermissionError::AlreadyRequested { scope: "health" })
        );
    }

    #[test]
    fn health_batch_needs_every_permission() {
        let mut results = REQUIRED_HEALTH_PERMISSIONS
            .iter()
            .map(|permission| (*permission, true))
            .collect::<Vec<_>>();
        assert!(all_health_permissions_granted(&results));

        results[3].1 = false;
        assert!(!all_health_permissions_granted(&results));

        let partial = [(HealthPermission::read(HealthRecordType::HeartRate), true)];
        assert!(!all_health_permissions_granted(&partial));
    }
}
