//! The reconciliation procedure run for every trigger a unit receives.
//!
//! Every trigger is handled to completion before the next one. Nothing is carried over between
//! triggers apart from what lives in the collaborators (supervisor plan, peer data), so the
//! resulting status is always derived from the current config and the current shared password.
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};
use strum::{EnumDiscriminants, IntoStaticStr};

use crate::{
    config::{CharmOptions, RawConfig},
    leadership::Leadership,
    logging::controller::{ReconcilerError, report_reconciled},
    peer::{PeerCluster, PeerError, PeerEvent, PeerRelation},
    secret::WebPassword,
    status::{ReconcileState, UnitStatus, WEB_PASSWORD_NOT_SET},
    supervisor::{
        Supervisor, SupervisorError, build_layer,
        layer::{LAYER_LABEL, SERVICE_NAME},
    },
    validation::{self, ConfigError},
};

/// Inputs which make the reconciler run.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Trigger {
    SupervisorReady,
    ConfigChanged,
    ClusterReady,
    WebPasswordChanged,
}

impl From<PeerEvent> for Trigger {
    fn from(event: PeerEvent) -> Self {
        match event {
            PeerEvent::ClusterReady => Self::ClusterReady,
            PeerEvent::WebPasswordChanged => Self::WebPasswordChanged,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconcileAction {
    /// The trigger has been fully handled.
    Done,

    /// The trigger could not be handled yet and has to be delivered again later.
    Defer,
}

/// The outcome of handling a single [`Trigger`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reconciled {
    pub action: ReconcileAction,

    /// The status to report, `None` leaves the current status untouched.
    pub status: Option<UnitStatus>,

    /// A trigger which has to be delivered to this unit next.
    pub follow_up: Option<Trigger>,
}

impl Reconciled {
    fn done() -> Self {
        Self {
            action: ReconcileAction::Done,
            status: None,
            follow_up: None,
        }
    }

    fn deferred(status: Option<UnitStatus>) -> Self {
        Self {
            action: ReconcileAction::Defer,
            status,
            follow_up: None,
        }
    }
}

#[derive(Debug, Snafu, EnumDiscriminants)]
#[strum_discriminants(derive(IntoStaticStr))]
pub enum Error {
    #[snafu(display("invalid charm configuration"))]
    InvalidConfig { source: ConfigError },

    #[snafu(display("{WEB_PASSWORD_NOT_SET}"))]
    WebPasswordNotSet,

    #[snafu(display("failed to look up service {name:?}"))]
    QueryService {
        source: SupervisorError,
        name: &'static str,
    },

    #[snafu(display("failed to submit layer {label:?}"))]
    SubmitLayer {
        source: SupervisorError,
        label: &'static str,
    },

    #[snafu(display("failed to (re)start service {name:?}"))]
    StartService {
        source: SupervisorError,
        name: &'static str,
    },
}

impl ReconcilerError for Error {
    fn category(&self) -> &'static str {
        ErrorDiscriminants::from(self).into()
    }
}

impl Error {
    /// The status a unit reports for this error, and whether the trigger has to be retried.
    fn outcome(&self) -> (UnitStatus, ReconcileAction) {
        match self {
            Self::InvalidConfig { source } => {
                (UnitStatus::blocked(source.to_string()), ReconcileAction::Done)
            }
            Self::WebPasswordNotSet => (
                UnitStatus::blocked(WEB_PASSWORD_NOT_SET),
                ReconcileAction::Done,
            ),
            Self::QueryService { .. } | Self::SubmitLayer { .. } | Self::StartService { .. } => {
                (UnitStatus::waiting_for_supervisor(), ReconcileAction::Defer)
            }
        }
    }
}

/// Brings the workload in line with the charm config and the shared web password.
///
/// The collaborators are injected so the reconciler can run against the real hosting runtime as
/// well as against in process fakes.
#[derive(Debug)]
pub struct Reconciler<S, P, L> {
    options: CharmOptions,
    supervisor: S,
    peers: PeerCluster<P>,
    leadership: L,
    state: ReconcileState,
}

impl<S, P, L> Reconciler<S, P, L>
where
    S: Supervisor,
    P: PeerRelation,
    L: Leadership,
{
    pub fn new(options: CharmOptions, supervisor: S, relation: P, leadership: L) -> Self {
        Self {
            options,
            supervisor,
            peers: PeerCluster::new(relation),
            leadership,
            state: ReconcileState::default(),
        }
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut S {
        &mut self.supervisor
    }

    pub fn peers(&self) -> &PeerCluster<P> {
        &self.peers
    }

    /// Mutable access to the peer data together with the leadership oracle, which gates writes.
    pub fn coordination_mut(&mut self) -> (&L, &mut PeerCluster<P>) {
        (&self.leadership, &mut self.peers)
    }

    pub fn into_parts(self) -> (S, P, L) {
        (self.supervisor, self.peers.into_relation(), self.leadership)
    }

    /// Handles a single trigger with the charm config that is current for it.
    pub fn reconcile(&mut self, trigger: Trigger, config: &RawConfig) -> Reconciled {
        let span = tracing::info_span!("reconcile", %trigger);
        let _enter = span.enter();

        match trigger {
            Trigger::ClusterReady => self.ensure_web_password(),
            Trigger::SupervisorReady | Trigger::ConfigChanged | Trigger::WebPasswordChanged => {
                self.restart(trigger, config)
            }
        }
    }

    /// Generates the shared password if this unit is the leader and nobody has set one yet.
    ///
    /// Repeated deliveries are a no-op once the password exists.
    fn ensure_web_password(&mut self) -> Reconciled {
        if !self.leadership.is_leader() {
            tracing::debug!("not the leader, leaving the web password to the leader");
            return Reconciled::done();
        }
        if self.peers.web_password().is_some() {
            tracing::debug!("web password already set");
            return Reconciled::done();
        }

        let password = WebPassword::generate();
        match self.peers.set_web_password(&self.leadership, &password) {
            Ok(event) => Reconciled {
                follow_up: Some(event.into()),
                ..Reconciled::done()
            },
            Err(PeerError::NotEstablished) => {
                tracing::info!("peer relation not available, deferring web password generation");
                Reconciled::deferred(None)
            }
            Err(PeerError::NotLeader) => {
                tracing::info!("lost leadership before storing the web password");
                Reconciled::done()
            }
        }
    }

    fn restart(&mut self, trigger: Trigger, config: &RawConfig) -> Reconciled {
        if !self.supervisor.can_connect() {
            tracing::info!("pebble socket not available, deferring {trigger}");
            self.state = ReconcileState::WaitingForSupervisor;
            return Reconciled::deferred(Some(UnitStatus::waiting_for_supervisor()));
        }

        self.state = ReconcileState::Reconciling;
        let result = self.apply(config);
        let (status, action) = match &result {
            Ok(()) => (UnitStatus::Active, ReconcileAction::Done),
            Err(err) => err.outcome(),
        };
        report_reconciled(trigger, &result, &status);

        self.state = ReconcileState::from(&status);
        Reconciled {
            action,
            status: Some(status),
            follow_up: None,
        }
    }

    fn apply(&mut self, config: &RawConfig) -> Result<(), Error> {
        let config = validation::validate(config).context(InvalidConfigSnafu)?;
        let password = self.peers.web_password().context(WebPasswordNotSetSnafu)?;

        let layer = build_layer(&self.options, &config, &password);
        let existing = self
            .supervisor
            .service(SERVICE_NAME)
            .context(QueryServiceSnafu { name: SERVICE_NAME })?;
        self.supervisor
            .add_layer(LAYER_LABEL, &layer, true)
            .context(SubmitLayerSnafu { label: LAYER_LABEL })?;

        let started = match existing {
            Some(service) if service.is_running() => self.supervisor.restart(SERVICE_NAME),
            Some(_) => self.supervisor.start(SERVICE_NAME),
            // A fresh service is started by the supervisor according to its startup policy.
            None => self.supervisor.replan(),
        };
        started.context(StartServiceSnafu { name: SERVICE_NAME })?;

        tracing::info!(service = SERVICE_NAME, "workload (re)started with current configuration");
        Ok(())
    }
}
