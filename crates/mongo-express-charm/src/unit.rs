//! Event dispatch for a single unit.
//!
//! The hosting runtime invokes the charm once per hook or action. [`Unit`] maps those onto
//! [`Trigger`]s, re-delivers triggers deferred by earlier invocations first, and processes
//! follow-up triggers (e.g. the leader picking up the password it just generated) before it
//! returns.
use std::{collections::VecDeque, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    actions::{self, ActionName, ActionOutcome, ActionResults},
    config::{CharmOptions, RawConfig},
    leadership::Leadership,
    peer::{AppData, InMemoryPeerRelation, PeerCluster, PeerRelation},
    reconcile::{ReconcileAction, Reconciler, Trigger},
    status::{ReconcileState, UnitStatus, WEB_PASSWORD_NOT_SET},
    supervisor::{Layer, Supervisor, build_layer, local::LocalSupervisor},
    validation::{self, ConfigError},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read unit state from {path:?}"))]
    ReadState {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("failed to parse unit state from {path:?}"))]
    ParseState {
        source: serde_yaml::Error,
        path: String,
    },

    #[snafu(display("failed to serialize unit state"))]
    SerializeState { source: serde_yaml::Error },

    #[snafu(display("failed to write unit state to {path:?}"))]
    WriteState {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("{input:?} is neither a known hook nor a known action"))]
    UnknownDispatch { input: String },

    #[snafu(display("unit state holds an invalid charm configuration"))]
    InvalidConfig { source: ConfigError },

    #[snafu(display("{WEB_PASSWORD_NOT_SET}"))]
    WebPasswordNotSet,
}

/// Hooks the charm subscribes to.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum HookEvent {
    MongoExpressPebbleReady,
    ConfigChanged,
    ClusterRelationCreated,
    ClusterRelationChanged,
}

/// What the runtime asked the charm to do in this invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dispatch {
    Hook(HookEvent),
    Action(ActionName),
}

impl FromStr for Dispatch {
    type Err = Error;

    /// Accepts `JUJU_DISPATCH_PATH` style input (`hooks/config-changed`,
    /// `actions/get-credentials`) as well as bare hook or action names.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownDispatchSnafu { input }.build();

        match input.split_once('/') {
            Some(("hooks", hook)) => HookEvent::from_str(hook)
                .map(Self::Hook)
                .map_err(|_| unknown()),
            Some(("actions", action)) => ActionName::from_str(action)
                .map(Self::Action)
                .map_err(|_| unknown()),
            Some(_) => Err(unknown()),
            None => HookEvent::from_str(input)
                .map(Self::Hook)
                .or_else(|_| ActionName::from_str(input).map(Self::Action))
                .map_err(|_| unknown()),
        }
    }
}

/// A unit of the application: the reconciler plus what the runtime remembers between
/// invocations.
#[derive(Debug)]
pub struct Unit<S, P, L> {
    reconciler: Reconciler<S, P, L>,
    status: UnitStatus,
    deferred: VecDeque<Trigger>,
}

impl<S, P, L> Unit<S, P, L>
where
    S: Supervisor,
    P: PeerRelation,
    L: Leadership,
{
    pub fn new(options: CharmOptions, supervisor: S, relation: P, leadership: L) -> Self {
        Self {
            reconciler: Reconciler::new(options, supervisor, relation, leadership),
            status: UnitStatus::default(),
            deferred: VecDeque::new(),
        }
    }

    /// Restores the status and the deferred triggers of an earlier invocation.
    pub fn with_history(
        mut self,
        status: UnitStatus,
        deferred: impl IntoIterator<Item = Trigger>,
    ) -> Self {
        self.status = status;
        self.deferred = deferred.into_iter().collect();
        self
    }

    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    pub fn state(&self) -> ReconcileState {
        self.reconciler.state()
    }

    pub fn deferred(&self) -> &VecDeque<Trigger> {
        &self.deferred
    }

    pub fn reconciler(&self) -> &Reconciler<S, P, L> {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut Reconciler<S, P, L> {
        &mut self.reconciler
    }

    pub fn into_reconciler(self) -> Reconciler<S, P, L> {
        self.reconciler
    }

    /// Handles a hook with the charm config current for this invocation.
    pub fn dispatch(&mut self, hook: HookEvent, config: &RawConfig) {
        tracing::debug!(%hook, "dispatching hook");
        self.redeliver_deferred(config);

        let peers = self.reconciler.peers();
        let trigger = match hook {
            HookEvent::MongoExpressPebbleReady => Some(Trigger::SupervisorReady),
            HookEvent::ConfigChanged => Some(Trigger::ConfigChanged),
            HookEvent::ClusterRelationCreated => Some(peers.on_relation_created().into()),
            HookEvent::ClusterRelationChanged => peers.on_relation_changed().map(Into::into),
        };

        if let Some(trigger) = trigger {
            self.process(trigger, config);
        } else {
            tracing::debug!(%hook, "hook does not concern this unit");
        }
    }

    /// Runs an operator action. Actions never change the unit status themselves, but a
    /// successful password change reconciles the workload with the new password.
    pub fn run_action(&mut self, action: ActionName, config: &RawConfig) -> ActionOutcome {
        tracing::debug!(%action, "running action");

        match action {
            ActionName::GetCredentials => {
                let result = actions::get_credentials(config, self.reconciler.peers())
                    .map(ActionResults::from);
                ActionOutcome::from_result(action, result)
            }
            ActionName::ChangePassword => {
                let (leadership, peers) = self.reconciler.coordination_mut();
                let result = actions::change_password(leadership, peers);
                let outcome = ActionOutcome::from_result(
                    action,
                    result.as_ref().map(|(password, _)| {
                        ActionResults::from([("new-password".to_owned(), password.to_string())])
                    }),
                );
                if let Ok((_, event)) = result {
                    self.process(event.into(), config);
                }
                outcome
            }
        }
    }

    fn redeliver_deferred(&mut self, config: &RawConfig) {
        for trigger in std::mem::take(&mut self.deferred) {
            tracing::debug!(%trigger, "re-delivering deferred trigger");
            self.process(trigger, config);
        }
    }

    /// Handles `trigger` and every follow-up trigger it causes, one at a time.
    fn process(&mut self, trigger: Trigger, config: &RawConfig) {
        let mut queue = VecDeque::from([trigger]);

        while let Some(trigger) = queue.pop_front() {
            let reconciled = self.reconciler.reconcile(trigger, config);

            if let Some(status) = reconciled.status {
                if status != self.status {
                    tracing::info!(from = %self.status, to = %status, "unit status changed");
                }
                self.status = status;
            }
            if reconciled.action == ReconcileAction::Defer && !self.deferred.contains(&trigger) {
                self.deferred.push_back(trigger);
            }
            queue.extend(reconciled.follow_up);
        }
    }
}

/// Everything the runtime keeps for a unit between two invocations, as stored by the
/// `mongo-express-charm` binary.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitState {
    /// User supplied charm config, layered on top of the `config.yaml` defaults.
    #[serde(default)]
    pub config: RawConfig,

    #[serde(default)]
    pub leader: bool,

    /// Application data of the `cluster` peer relation, absent until the relation exists.
    #[serde(default)]
    pub peer_data: Option<AppData>,

    #[serde(default)]
    pub supervisor: LocalSupervisor,

    #[serde(default)]
    pub status: UnitStatus,

    #[serde(default)]
    pub deferred: Vec<Trigger>,
}

/// A unit backed by a [`UnitState`].
pub type LocalUnit = Unit<LocalSupervisor, InMemoryPeerRelation, bool>;

impl UnitState {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).context(ReadStateSnafu { path: &display })?;
        serde_yaml::from_str(&contents).context(ParseStateSnafu { path: display })
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let contents = serde_yaml::to_string(self).context(SerializeStateSnafu)?;
        fs::write(path, contents).context(WriteStateSnafu {
            path: path.display().to_string(),
        })
    }

    /// The config the charm sees: `config.yaml` defaults overridden by the user's config.
    pub fn effective_config(&self) -> RawConfig {
        RawConfig::charm_defaults().merged_with(&self.config)
    }

    /// Builds the unit for one invocation.
    ///
    /// The peer relation is created on `cluster-relation-created`, mirroring the runtime which
    /// only hands out the data bag from that hook on.
    pub fn into_unit(self, options: CharmOptions, dispatch: Dispatch) -> (LocalUnit, RawConfig) {
        let config = self.effective_config();
        let relation = InMemoryPeerRelation::from_app_data(self.peer_data);
        if dispatch == Dispatch::Hook(HookEvent::ClusterRelationCreated) {
            relation.establish();
        }

        let unit = Unit::new(options, self.supervisor, relation, self.leader)
            .with_history(self.status, self.deferred);
        (unit, config)
    }

    /// The layer the reconciler would submit for this state, without touching the supervisor.
    pub fn render_layer(&self, options: &CharmOptions) -> Result<Layer, Error> {
        let config = validation::validate(&self.effective_config()).context(InvalidConfigSnafu)?;
        let peers = PeerCluster::new(InMemoryPeerRelation::from_app_data(self.peer_data.clone()));
        let password = peers.web_password().context(WebPasswordNotSetSnafu)?;

        Ok(build_layer(options, &config, &password))
    }

    /// Captures what has to survive until the next invocation.
    pub fn from_unit(unit: LocalUnit, config: RawConfig) -> Self {
        let status = unit.status().clone();
        let deferred = unit.deferred().iter().copied().collect();
        let (supervisor, relation, leader) = unit.into_reconciler().into_parts();

        Self {
            config,
            leader,
            peer_data: relation.app_data(),
            supervisor,
            status,
            deferred,
        }
    }
}

/// Loads the state at `path`, handles `dispatch` and writes the state back.
pub fn dispatch_with_state(
    path: &Path,
    options: CharmOptions,
    dispatch: Dispatch,
) -> Result<(UnitStatus, Option<ActionOutcome>), Error> {
    let state = UnitState::load(path)?;
    let user_config = state.config.clone();
    let (mut unit, config) = state.into_unit(options, dispatch);

    let outcome = match dispatch {
        Dispatch::Hook(hook) => {
            unit.dispatch(hook, &config);
            None
        }
        Dispatch::Action(action) => Some(unit.run_action(action, &config)),
    };

    let status = unit.status().clone();
    UnitState::from_unit(unit, user_config).save(path)?;
    Ok((status, outcome))
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use rstest::rstest;

    use super::*;
    use crate::{
        config::ConfigValue,
        peer::WEB_PASSWORD_KEY,
        status::WAITING_FOR_SUPERVISOR,
    };

    fn config() -> RawConfig {
        RawConfig::charm_defaults()
    }

    #[rstest]
    #[case("config-changed", Dispatch::Hook(HookEvent::ConfigChanged))]
    #[case("hooks/mongo-express-pebble-ready", Dispatch::Hook(HookEvent::MongoExpressPebbleReady))]
    #[case("hooks/cluster-relation-created", Dispatch::Hook(HookEvent::ClusterRelationCreated))]
    #[case("actions/get-credentials", Dispatch::Action(ActionName::GetCredentials))]
    #[case("change-password", Dispatch::Action(ActionName::ChangePassword))]
    fn parse_dispatch_paths(#[case] input: &str, #[case] expected: Dispatch) {
        assert_eq!(Dispatch::from_str(input).ok(), Some(expected));
    }

    #[rstest]
    #[case::unknown_hook("hooks/upgrade-charm")]
    #[case::action_as_hook("hooks/get-credentials")]
    #[case::unknown_kind("relations/cluster")]
    #[case::empty("")]
    fn reject_unknown_dispatch_paths(#[case] input: &str) {
        assert!(matches!(
            Dispatch::from_str(input),
            Err(Error::UnknownDispatch { .. })
        ));
    }

    #[test]
    fn deferred_trigger_is_redelivered_once_supervisor_is_up() {
        let relation = InMemoryPeerRelation::established();
        let mut unit = Unit::new(
            CharmOptions::default(),
            LocalSupervisor::unreachable(),
            relation,
            true,
        );

        unit.dispatch(HookEvent::ClusterRelationCreated, &config());

        // The password was generated, but the supervisor is not up yet.
        assert_eq!(
            unit.status(),
            &UnitStatus::Maintenance(WAITING_FOR_SUPERVISOR.to_owned())
        );
        assert_eq!(unit.deferred(), &[Trigger::WebPasswordChanged]);

        unit.reconciler_mut().supervisor_mut().set_connectable(true);
        unit.dispatch(HookEvent::MongoExpressPebbleReady, &config());

        assert_eq!(unit.status(), &UnitStatus::Active);
        assert!(unit.deferred().is_empty());
        // Redelivered WebPasswordChanged plus the pebble-ready hook itself.
        assert_eq!(unit.reconciler().supervisor().start_requests(), 2);
    }

    #[test]
    fn repeated_deferrals_are_not_duplicated() {
        let mut unit = Unit::new(
            CharmOptions::default(),
            LocalSupervisor::unreachable(),
            InMemoryPeerRelation::established(),
            false,
        );

        unit.dispatch(HookEvent::ConfigChanged, &config());
        unit.dispatch(HookEvent::ConfigChanged, &config());

        assert_eq!(unit.deferred(), &[Trigger::ConfigChanged]);
    }

    #[test]
    fn relation_changed_without_password_keeps_status() {
        let mut unit = Unit::new(
            CharmOptions::default(),
            LocalSupervisor::new(),
            InMemoryPeerRelation::established(),
            false,
        );

        unit.dispatch(HookEvent::ClusterRelationChanged, &config());

        assert_eq!(unit.status(), &UnitStatus::Unknown);
        assert_eq!(unit.state(), ReconcileState::Unconfigured);
    }

    #[test]
    fn blocked_unit_recovers_after_config_fix() {
        let relation = InMemoryPeerRelation::established();
        let mut unit = Unit::new(
            CharmOptions::default(),
            LocalSupervisor::new(),
            relation,
            true,
        );
        unit.dispatch(HookEvent::ClusterRelationCreated, &config());

        let mut broken = config();
        broken.insert("editor-theme", "wrong value");
        unit.dispatch(HookEvent::ConfigChanged, &broken);
        assert_eq!(
            unit.status(),
            &UnitStatus::blocked("editor-theme: invalid value.")
        );

        unit.dispatch(HookEvent::ConfigChanged, &config());
        assert_eq!(unit.status(), &UnitStatus::Active);
    }

    #[test]
    fn get_credentials_does_not_touch_status() {
        let mut relation = InMemoryPeerRelation::established();
        relation
            .set(WEB_PASSWORD_KEY, "pass".to_owned())
            .expect("relation is established");
        let mut unit = Unit::new(
            CharmOptions::default(),
            LocalSupervisor::new(),
            relation,
            false,
        )
        .with_history(UnitStatus::Active, []);

        let outcome = unit.run_action(ActionName::GetCredentials, &config());

        assert_eq!(
            outcome,
            ActionOutcome::Completed(ActionResults::from([
                ("username".to_owned(), "admin".to_owned()),
                ("password".to_owned(), "pass".to_owned()),
            ]))
        );
        assert_eq!(unit.status(), &UnitStatus::Active);
        assert!(unit.reconciler().supervisor().requests().is_empty());
    }

    #[test]
    fn change_password_reconciles_with_new_password() {
        let leader = Rc::new(Cell::new(true));
        let mut unit = Unit::new(
            CharmOptions::default(),
            LocalSupervisor::new(),
            InMemoryPeerRelation::established(),
            leader.clone(),
        );
        unit.dispatch(HookEvent::ClusterRelationCreated, &config());

        let outcome = unit.run_action(ActionName::ChangePassword, &config());

        let new_password = match outcome {
            ActionOutcome::Completed(results) => results.get("new-password").cloned(),
            ActionOutcome::Failed(_) => None,
        }
        .expect("leader can change the password");
        let plan = unit.reconciler().supervisor().plan();
        assert_eq!(
            plan["mongo-express"]
                .environment
                .get("ME_CONFIG_BASICAUTH_PASSWORD"),
            Some(&ConfigValue::String(new_password))
        );

        leader.set(false);
        assert_eq!(
            unit.run_action(ActionName::ChangePassword, &config()),
            ActionOutcome::Failed(
                "Failed changing the password: only the leader can change the password".to_owned()
            )
        );
    }

    #[test]
    fn state_survives_round_trip_through_unit() {
        let state = UnitState {
            leader: true,
            ..UnitState::default()
        };

        let dispatch = Dispatch::Hook(HookEvent::ClusterRelationCreated);
        let (mut unit, config) = state.into_unit(CharmOptions::default(), dispatch);
        unit.dispatch(HookEvent::ClusterRelationCreated, &config);
        let state = UnitState::from_unit(unit, RawConfig::default());

        assert_eq!(state.status, UnitStatus::Active);
        assert!(state.deferred.is_empty());
        assert!(
            state
                .peer_data
                .as_ref()
                .is_some_and(|data| data.contains_key(WEB_PASSWORD_KEY))
        );
        assert!(state.supervisor.is_running("mongo-express"));
    }
}
