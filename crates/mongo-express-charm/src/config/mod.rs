//! Charm configuration as handed over by the hosting runtime, plus the options the charm itself
//! is started with.
//!
//! Two layers are kept apart here:
//!
//! - [`RawConfig`] is the user facing charm config (`juju config`), supplied fresh with every
//!   event and never mutated by the charm. Its declared defaults live in `charm/config.yaml`.
//! - [`CharmOptions`] are deployment level settings (MongoDB endpoint, listen port, ...) which
//!   are fixed for the lifetime of the charm process.
use std::{collections::BTreeMap, fmt::Display, sync::LazyLock};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub mod theme;

pub const DEFAULT_MONGODB_SERVER: &str = "mongodb-k8s-0.mongodb-k8s-endpoints";
pub const DEFAULT_MONGODB_PORT: u16 = 27017;
pub const DEFAULT_LISTEN_PORT: u16 = 8081;
pub const DEFAULT_COMMAND: &str = "tini -s -- /docker-entrypoint.sh";
pub const DEFAULT_COOKIE_SECRET: &str = "cookiesecret";
pub const DEFAULT_SESSION_SECRET: &str = "sessionsecret";

const CHARM_CONFIG_YAML: &str = include_str!("../../charm/config.yaml");

static CHARM_DEFAULTS: LazyLock<RawConfig> = LazyLock::new(|| {
    RawConfig::from_declarations(CHARM_CONFIG_YAML)
        .expect("failed to parse embedded charm config.yaml")
});

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse config declarations"))]
    ParseDeclarations { source: serde_yaml::Error },
}

/// The configuration keys every unit needs before the workload can be rendered.
///
/// The declaration order is the order in which missing keys are reported.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    strum::AsRefStr,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    EditorTheme,
    WebUsername,
    ReadOnly,
    EnableGridfs,
}

/// A single config value. The hosting runtime already type checked it against `config.yaml`,
/// so only the scalar shapes Juju knows about are modelled.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    String(String),
}

impl ConfigValue {
    /// Returns `true` for empty strings, which Juju uses to express "unset" for string options.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::String(value) if value.is_empty())
    }
}

impl Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// The charm config for a single event.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawConfig(BTreeMap<String, ConfigValue>);

impl RawConfig {
    /// The defaults declared in the charm's `config.yaml`.
    pub fn charm_defaults() -> Self {
        CHARM_DEFAULTS.clone()
    }

    /// Collects the `default` of every option declared in a `config.yaml` document.
    ///
    /// Options without a default are left out, they count as missing until the user sets them.
    pub fn from_declarations(config_yaml: &str) -> Result<Self, Error> {
        let declarations: ConfigDeclarations =
            serde_yaml::from_str(config_yaml).context(ParseDeclarationsSnafu)?;

        Ok(declarations
            .options
            .into_iter()
            .filter_map(|(name, option)| option.default.map(|default| (name, default)))
            .collect())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets `key`, returning the previous value if there was one.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Option<ConfigValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.0.remove(key)
    }

    /// Layers `other` on top of `self`, keys in `other` win.
    pub fn merged_with(mut self, other: &Self) -> Self {
        self.0
            .extend(other.0.iter().map(|(key, value)| (key.clone(), value.clone())));
        self
    }
}

impl<K, V> FromIterator<(K, V)> for RawConfig
where
    K: Into<String>,
    V: Into<ConfigValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ConfigDeclarations {
    #[serde(default)]
    options: BTreeMap<String, OptionDeclaration>,
}

#[derive(Debug, Deserialize)]
struct OptionDeclaration {
    #[serde(default)]
    default: Option<ConfigValue>,
}

/// Settings the charm is started with, which are not part of the user facing charm config.
#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
#[command(next_help_heading = "Workload Options")]
pub struct CharmOptions {
    /// Host name of the MongoDB server mongo-express connects to.
    #[arg(long, env, default_value = DEFAULT_MONGODB_SERVER)]
    pub mongodb_server: String,

    /// Port of the MongoDB server.
    #[arg(long, env, default_value_t = DEFAULT_MONGODB_PORT)]
    pub mongodb_port: u16,

    /// Port the mongo-express web UI listens on.
    #[arg(long, env, default_value_t = DEFAULT_LISTEN_PORT)]
    pub listen_port: u16,

    /// Command Pebble uses to launch mongo-express inside the workload container.
    #[arg(long = "workload-command", env = "WORKLOAD_COMMAND", default_value = DEFAULT_COMMAND)]
    pub command: String,

    #[arg(long, env, default_value = DEFAULT_COOKIE_SECRET, hide_env_values = true)]
    pub cookie_secret: String,

    #[arg(long, env, default_value = DEFAULT_SESSION_SECRET, hide_env_values = true)]
    pub session_secret: String,
}

impl Default for CharmOptions {
    fn default() -> Self {
        Self {
            mongodb_server: DEFAULT_MONGODB_SERVER.to_owned(),
            mongodb_port: DEFAULT_MONGODB_PORT,
            listen_port: DEFAULT_LISTEN_PORT,
            command: DEFAULT_COMMAND.to_owned(),
            cookie_secret: DEFAULT_COOKIE_SECRET.to_owned(),
            session_secret: DEFAULT_SESSION_SECRET.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[test]
    fn charm_defaults_cover_required_keys() {
        let defaults = RawConfig::charm_defaults();

        assert_eq!(
            defaults.get("editor-theme"),
            Some(&ConfigValue::from("default"))
        );
        assert_eq!(defaults.get("web-username"), Some(&ConfigValue::from("admin")));
        assert_eq!(defaults.get("read-only"), Some(&ConfigValue::Bool(false)));
        assert_eq!(defaults.get("enable-gridfs"), Some(&ConfigValue::Bool(false)));
    }

    #[test]
    fn declarations_without_default_are_skipped() {
        let config = RawConfig::from_declarations(indoc! {"
            options:
              with-default:
                type: int
                default: 3
              without-default:
                type: string
        "})
        .expect("declarations are valid YAML");

        assert_eq!(config.get("with-default"), Some(&ConfigValue::Int(3)));
        assert!(!config.contains_key("without-default"));
    }

    #[test]
    fn user_config_overrides_defaults() {
        let user: RawConfig = [("editor-theme", "dracula")].into_iter().collect();
        let config = RawConfig::charm_defaults().merged_with(&user);

        assert_eq!(config.get("editor-theme"), Some(&ConfigValue::from("dracula")));
        assert_eq!(config.get("web-username"), Some(&ConfigValue::from("admin")));
    }

    #[rstest]
    #[case::string("admin", ConfigValue::String("admin".to_owned()))]
    #[case::bool("true", ConfigValue::Bool(true))]
    #[case::int("27017", ConfigValue::Int(27017))]
    fn config_values_deserialize_untagged(#[case] input: &str, #[case] expected: ConfigValue) {
        let value: ConfigValue = serde_yaml::from_str(input).expect("scalar is valid YAML");
        assert_eq!(value, expected);
    }

    #[rstest]
    #[case(ConfigKey::EditorTheme, "editor-theme")]
    #[case(ConfigKey::WebUsername, "web-username")]
    #[case(ConfigKey::ReadOnly, "read-only")]
    #[case(ConfigKey::EnableGridfs, "enable-gridfs")]
    fn config_keys_use_kebab_case(#[case] key: ConfigKey, #[case] expected: &str) {
        assert_eq!(key.to_string(), expected);
    }
}
