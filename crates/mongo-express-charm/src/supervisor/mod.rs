//! The process supervisor (Pebble) running the workload inside the container.
//!
//! The charm never starts processes itself. It submits a declarative [`Layer`] and asks the
//! supervisor to (re)start services.
use serde::{Deserialize, Serialize};
use snafu::Snafu;

pub mod layer;
pub mod local;

pub use layer::{Layer, Override, Service, Startup, build_layer};

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum SupervisorError {
    #[snafu(display("cannot connect to the supervisor socket"))]
    Unavailable,

    #[snafu(display("service {name:?} is not part of the plan"))]
    UnknownService { name: String },

    #[snafu(display("layer {label:?} already exists, refusing to replace it without combining"))]
    LayerConflict { label: String },
}

/// Runtime state of a service as reported by the supervisor.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceStatus {
    Active,
    #[default]
    Inactive,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceInfo {
    pub name: String,
    pub startup: Startup,
    pub current: ServiceStatus,
}

impl ServiceInfo {
    pub fn is_running(&self) -> bool {
        self.current == ServiceStatus::Active
    }
}

/// Client side of the supervisor API the charm relies on.
pub trait Supervisor {
    /// Whether the supervisor socket is reachable right now.
    fn can_connect(&self) -> bool;

    /// Adds a layer under `label`. With `combine` an existing layer of the same label is merged
    /// according to each service's [`Override`].
    fn add_layer(
        &mut self,
        label: &str,
        layer: &Layer,
        combine: bool,
    ) -> Result<(), SupervisorError>;

    /// Looks up a service of the current plan, `None` if the plan has no such service.
    fn service(&self, name: &str) -> Result<Option<ServiceInfo>, SupervisorError>;

    fn start(&mut self, name: &str) -> Result<(), SupervisorError>;

    /// Stops (if running) and starts the service again.
    fn restart(&mut self, name: &str) -> Result<(), SupervisorError>;

    /// Brings the running services in line with the plan, starting services with
    /// [`Startup::Enabled`].
    fn replan(&mut self) -> Result<(), SupervisorError>;
}
