//! The workload status a unit reports to the hosting runtime.
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Message shown while the supervisor socket is not reachable.
pub const WAITING_FOR_SUPERVISOR: &str = "waiting for pebble to start";

/// Message shown while no unit has distributed the web password yet.
pub const WEB_PASSWORD_NOT_SET: &str = "cluster web-password has not been set yet";

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    /// Nothing has been reported yet.
    #[default]
    Unknown,
    Active,
    Maintenance(String),
    Blocked(String),
}

impl UnitStatus {
    pub fn waiting_for_supervisor() -> Self {
        Self::Maintenance(WAITING_FOR_SUPERVISOR.to_owned())
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::Blocked(message.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Active => "active",
            Self::Maintenance(_) => "maintenance",
            Self::Blocked(_) => "blocked",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Unknown | Self::Active => "",
            Self::Maintenance(message) | Self::Blocked(message) => message,
        }
    }
}

impl Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            "" => f.write_str(self.name()),
            message => write!(f, "{name}: {message}", name = self.name()),
        }
    }
}

/// Where the reconciler stands after the last trigger it handled.
///
/// This is not persisted, it is derived from the most recent outcome.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display)]
pub enum ReconcileState {
    #[default]
    Unconfigured,
    Reconciling,
    Active,
    Blocked,
    WaitingForSupervisor,
}

impl From<&UnitStatus> for ReconcileState {
    fn from(status: &UnitStatus) -> Self {
        match status {
            UnitStatus::Unknown => Self::Unconfigured,
            UnitStatus::Active => Self::Active,
            UnitStatus::Maintenance(_) => Self::WaitingForSupervisor,
            UnitStatus::Blocked(_) => Self::Blocked,
        }
    }
}
