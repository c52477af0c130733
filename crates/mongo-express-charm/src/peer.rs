//! The `cluster` peer relation, used to distribute the web UI password to every unit.
//!
//! The relation's application data bag is a loosely typed string map shared by all units of the
//! application. Only the leader may write it. [`PeerCluster`] is the single place which knows
//! about keys in that map. Everything else works with [`WebPassword`] and [`PeerEvent`].
use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use serde::{Deserialize, Serialize};
use snafu::{Snafu, ensure};

use crate::{leadership::Leadership, secret::WebPassword};

pub const PEER_RELATION_NAME: &str = "cluster";
pub const WEB_PASSWORD_KEY: &str = "web-password";

/// The application data bag of a peer relation.
pub type AppData = BTreeMap<String, String>;

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum PeerError {
    #[snafu(display("the {PEER_RELATION_NAME:?} peer relation is not established yet"))]
    NotEstablished,

    #[snafu(display("only the leader can write the application data of {PEER_RELATION_NAME:?}"))]
    NotLeader,
}

/// Access to the application data bag of the peer relation, as offered by the hosting runtime.
///
/// The runtime performs no access control, callers are expected to only write as the leader.
pub trait PeerRelation {
    fn is_established(&self) -> bool;

    /// Returns `None` if the key is unset or the relation is not established.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), PeerError>;
}

/// Notifications derived from peer relation activity.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PeerEvent {
    /// The peer relation was created, the application data bag can be used from now on.
    ClusterReady,

    /// The shared web password was set or replaced.
    WebPasswordChanged,
}

/// Typed view on the peer relation.
#[derive(Debug)]
pub struct PeerCluster<P> {
    relation: P,
}

impl<P> PeerCluster<P>
where
    P: PeerRelation,
{
    pub fn new(relation: P) -> Self {
        Self { relation }
    }

    pub fn into_relation(self) -> P {
        self.relation
    }

    /// Maps `cluster-relation-created`.
    pub fn on_relation_created(&self) -> PeerEvent {
        PeerEvent::ClusterReady
    }

    /// Maps `cluster-relation-changed`. Only yields an event once a password is available, a
    /// change to any other key does not concern the workload.
    pub fn on_relation_changed(&self) -> Option<PeerEvent> {
        self.web_password().map(|_| PeerEvent::WebPasswordChanged)
    }

    /// The shared password, `None` until the leader has set a non-empty one.
    pub fn web_password(&self) -> Option<WebPassword> {
        self.relation
            .get(WEB_PASSWORD_KEY)
            .filter(|password| !password.is_empty())
            .map(WebPassword::from)
    }

    /// Stores `password` for every unit of the application.
    ///
    /// Returns the [`PeerEvent::WebPasswordChanged`] notification which has to be delivered to
    /// this unit as well, the runtime does not notify the writing unit about its own change.
    pub fn set_web_password(
        &mut self,
        leadership: &impl Leadership,
        password: &WebPassword,
    ) -> Result<PeerEvent, PeerError> {
        ensure!(leadership.is_leader(), NotLeaderSnafu);
        ensure!(self.relation.is_established(), NotEstablishedSnafu);

        self.relation
            .set(WEB_PASSWORD_KEY, password.as_str().to_owned())?;
        tracing::info!(key = WEB_PASSWORD_KEY, "stored web password in peer relation");

        Ok(PeerEvent::WebPasswordChanged)
    }
}

/// In process peer relation. Clones share the same application data bag, so several units
/// created from clones of one handle see each other's writes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPeerRelation {
    app_data: Rc<RefCell<Option<AppData>>>,
}

impl InMemoryPeerRelation {
    /// A relation which has not been created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A created relation with an empty application data bag.
    pub fn established() -> Self {
        Self::from_app_data(Some(AppData::new()))
    }

    pub fn from_app_data(app_data: Option<AppData>) -> Self {
        Self {
            app_data: Rc::new(RefCell::new(app_data)),
        }
    }

    /// Creates the relation, keeping existing data if it already exists.
    pub fn establish(&self) {
        self.app_data.borrow_mut().get_or_insert_with(AppData::new);
    }

    /// A snapshot of the application data bag.
    pub fn app_data(&self) -> Option<AppData> {
        self.app_data.borrow().clone()
    }
}

impl PeerRelation for InMemoryPeerRelation {
    fn is_established(&self) -> bool {
        self.app_data.borrow().is_some()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.app_data
            .borrow()
            .as_ref()
            .and_then(|data| data.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), PeerError> {
        match self.app_data.borrow_mut().as_mut() {
            Some(data) => {
                data.insert(key.to_owned(), value);
                Ok(())
            }
            None => NotEstablishedSnafu.fail(),
        }
    }
}
