//! An in process supervisor which keeps the plan and service states in memory.
//!
//! Used by the dispatcher's state file and by tests. It follows Pebble's layer semantics closely
//! enough for the charm: layers are applied in the order they were added, services are merged by
//! their [`Override`](super::Override), and only [`Startup::Enabled`] services are started by a
//! replan.
use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::ensure;

use super::{
    Layer, Service, ServiceInfo, ServiceStatus, Startup, Supervisor, SupervisorError,
    UnavailableSnafu, UnknownServiceSnafu,
};

/// A request the charm made to the supervisor, in the order they were made.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SupervisorRequest {
    AddLayer { label: String },
    Start { name: String },
    Restart { name: String },
    Replan,
}

impl SupervisorRequest {
    /// Whether the request (re)starts workload processes.
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start { .. } | Self::Restart { .. } | Self::Replan)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalSupervisor {
    #[serde(default = "connectable_by_default")]
    connectable: bool,

    #[serde(default)]
    layers: IndexMap<String, Layer>,

    #[serde(default)]
    running: BTreeSet<String>,

    #[serde(skip)]
    requests: Vec<SupervisorRequest>,
}

fn connectable_by_default() -> bool {
    true
}

impl Default for LocalSupervisor {
    fn default() -> Self {
        Self {
            connectable: true,
            layers: IndexMap::new(),
            running: BTreeSet::new(),
            requests: Vec::new(),
        }
    }
}

impl LocalSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A supervisor whose socket is not up yet.
    pub fn unreachable() -> Self {
        Self {
            connectable: false,
            ..Self::default()
        }
    }

    pub fn set_connectable(&mut self, connectable: bool) {
        self.connectable = connectable;
    }

    /// The effective services after applying all layers in order.
    pub fn plan(&self) -> BTreeMap<String, Service> {
        let mut services: BTreeMap<String, Service> = BTreeMap::new();
        for service_layer in self.layers.values() {
            for (name, service) in &service_layer.services {
                services
                    .entry(name.clone())
                    .and_modify(|existing| existing.merge(service))
                    .or_insert_with(|| service.clone());
            }
        }
        services
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.running.contains(name)
    }

    /// Requests received since this supervisor was created or loaded.
    pub fn requests(&self) -> &[SupervisorRequest] {
        &self.requests
    }

    /// Number of recorded requests which (re)started processes.
    pub fn start_requests(&self) -> usize {
        self.requests.iter().filter(|r| r.is_start()).count()
    }

    fn ensure_known(&self, name: &str) -> Result<(), SupervisorError> {
        ensure!(
            self.plan().contains_key(name),
            UnknownServiceSnafu { name }
        );
        Ok(())
    }
}

impl Supervisor for LocalSupervisor {
    fn can_connect(&self) -> bool {
        self.connectable
    }

    fn add_layer(
        &mut self,
        label: &str,
        layer: &Layer,
        combine: bool,
    ) -> Result<(), SupervisorError> {
        ensure!(self.connectable, UnavailableSnafu);

        match self.layers.get_mut(label) {
            Some(existing) if combine => {
                if !layer.summary.is_empty() {
                    existing.summary.clone_from(&layer.summary);
                }
                if !layer.description.is_empty() {
                    existing.description.clone_from(&layer.description);
                }
                for (name, service) in &layer.services {
                    existing
                        .services
                        .entry(name.clone())
                        .and_modify(|current| current.merge(service))
                        .or_insert_with(|| service.clone());
                }
            }
            Some(_) => {
                return Err(SupervisorError::LayerConflict {
                    label: label.to_owned(),
                });
            }
            None => {
                self.layers.insert(label.to_owned(), layer.clone());
            }
        }

        self.requests.push(SupervisorRequest::AddLayer {
            label: label.to_owned(),
        });
        Ok(())
    }

    fn service(&self, name: &str) -> Result<Option<ServiceInfo>, SupervisorError> {
        ensure!(self.connectable, UnavailableSnafu);

        Ok(self.plan().get(name).map(|service| ServiceInfo {
            name: name.to_owned(),
            startup: service.startup,
            current: if self.is_running(name) {
                ServiceStatus::Active
            } else {
                ServiceStatus::Inactive
            },
        }))
    }

    fn start(&mut self, name: &str) -> Result<(), SupervisorError> {
        ensure!(self.connectable, UnavailableSnafu);
        self.ensure_known(name)?;

        self.running.insert(name.to_owned());
        self.requests.push(SupervisorRequest::Start {
            name: name.to_owned(),
        });
        Ok(())
    }

    fn restart(&mut self, name: &str) -> Result<(), SupervisorError> {
        ensure!(self.connectable, UnavailableSnafu);
        self.ensure_known(name)?;

        self.running.insert(name.to_owned());
        self.requests.push(SupervisorRequest::Restart {
            name: name.to_owned(),
        });
        Ok(())
    }

    fn replan(&mut self) -> Result<(), SupervisorError> {
        ensure!(self.connectable, UnavailableSnafu);

        let enabled = self
            .plan()
            .into_iter()
            .filter(|(_, service)| service.startup == Startup::Enabled)
            .map(|(name, _)| name);
        self.running.extend(enabled);
        self.requests.push(SupervisorRequest::Replan);
        Ok(())
    }
}
