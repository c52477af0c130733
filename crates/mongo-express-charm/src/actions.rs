//! Operator actions: `get-credentials` and `change-password`.
use std::collections::BTreeMap;

use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{
    config::{ConfigKey, RawConfig},
    leadership::Leadership,
    peer::{PeerCluster, PeerError, PeerEvent, PeerRelation},
    secret::WebPassword,
};

/// The result map of a successful action.
pub type ActionResults = BTreeMap<String, String>;

#[derive(
    Clone, Copy, Debug, Eq, PartialEq, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ActionName {
    GetCredentials,
    ChangePassword,
}

impl ActionName {
    fn failure_prefix(self) -> &'static str {
        match self {
            Self::GetCredentials => "Failed getting the credentials",
            Self::ChangePassword => "Failed changing the password",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionOutcome {
    Completed(ActionResults),
    Failed(String),
}

impl ActionOutcome {
    /// Builds the outcome reported to the operator, prefixing failures with what `action` was
    /// trying to do.
    pub fn from_result<E>(action: ActionName, result: Result<ActionResults, E>) -> Self
    where
        E: std::error::Error,
    {
        match result {
            Ok(results) => {
                tracing::info!(%action, "action successfully executed");
                Self::Completed(results)
            }
            Err(err) => {
                tracing::error!(%action, error = %err, "failed executing action");
                Self::Failed(format!("{prefix}: {err}", prefix = action.failure_prefix()))
            }
        }
    }
}

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum CredentialError {
    #[snafu(display("username is not defined"))]
    UsernameNotDefined,

    #[snafu(display("password is not defined"))]
    PasswordNotDefined,
}

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum ChangePasswordError {
    #[snafu(display("only the leader can change the password"))]
    NotLeader,

    #[snafu(display("failed to store the new password"))]
    StorePassword { source: PeerError },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: WebPassword,
}

impl From<Credentials> for ActionResults {
    fn from(credentials: Credentials) -> Self {
        Self::from([
            ("username".to_owned(), credentials.username),
            ("password".to_owned(), credentials.password.to_string()),
        ])
    }
}

/// Reads the web UI credentials without changing anything.
pub fn get_credentials<P>(
    config: &RawConfig,
    peers: &PeerCluster<P>,
) -> Result<Credentials, CredentialError>
where
    P: PeerRelation,
{
    tracing::debug!("executing action get-credentials");

    let username = config
        .get(ConfigKey::WebUsername.as_ref())
        .filter(|username| !username.is_empty())
        .map(ToString::to_string)
        .context(UsernameNotDefinedSnafu)?;
    let password = peers.web_password().context(PasswordNotDefinedSnafu)?;

    Ok(Credentials { username, password })
}

/// Replaces the shared password with a freshly generated one.
///
/// Returns the new password and the notification which makes this unit pick it up. The other
/// units are notified by the runtime through the peer relation.
pub fn change_password<P, L>(
    leadership: &L,
    peers: &mut PeerCluster<P>,
) -> Result<(WebPassword, PeerEvent), ChangePasswordError>
where
    P: PeerRelation,
    L: Leadership,
{
    ensure!(leadership.is_leader(), NotLeaderSnafu);

    let password = WebPassword::generate();
    let event = peers
        .set_web_password(leadership, &password)
        .context(StorePasswordSnafu)?;

    Ok((password, event))
}
