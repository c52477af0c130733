//! Pebble layers and the layer rendered for mongo-express.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::{CharmOptions, ConfigValue},
    secret::WebPassword,
    validation::CharmConfig,
};

pub const SERVICE_NAME: &str = "mongo-express";
pub const LAYER_LABEL: &str = "mongo-express";

/// How a service definition in a new layer is combined with an existing definition of the same
/// name.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Override {
    Merge,
    #[default]
    Replace,
}

/// Whether Pebble starts the service on its own.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Startup {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Service {
    #[serde(rename = "override")]
    pub override_: Override,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,

    pub command: String,

    #[serde(default)]
    pub startup: Startup,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, ConfigValue>,
}

impl Service {
    /// Applies `other` on top of `self` according to `other`'s [`Override`].
    pub fn merge(&mut self, other: &Self) {
        match other.override_ {
            Override::Replace => *self = other.clone(),
            Override::Merge => {
                if !other.summary.is_empty() {
                    self.summary.clone_from(&other.summary);
                }
                if !other.command.is_empty() {
                    self.command.clone_from(&other.command);
                }
                self.startup = other.startup;
                self.environment.extend(
                    other
                        .environment
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone())),
                );
            }
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

impl Layer {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Renders the layer running mongo-express with the validated `config` and the shared
/// `password`.
pub fn build_layer(options: &CharmOptions, config: &CharmConfig, password: &WebPassword) -> Layer {
    let environment: BTreeMap<String, ConfigValue> = [
        (
            "ME_CONFIG_MONGODB_SERVER",
            ConfigValue::from(options.mongodb_server.as_str()),
        ),
        (
            "ME_CONFIG_MONGODB_PORT",
            ConfigValue::from(options.mongodb_port),
        ),
        ("ME_CONFIG_MONGODB_ENABLE_ADMIN", ConfigValue::Bool(true)),
        ("ME_CONFIG_SITE_BASEURL", ConfigValue::from("/")),
        (
            "ME_CONFIG_SITE_COOKIESECRET",
            ConfigValue::from(options.cookie_secret.as_str()),
        ),
        (
            "ME_CONFIG_SITE_SESSIONSECRET",
            ConfigValue::from(options.session_secret.as_str()),
        ),
        (
            "ME_CONFIG_BASICAUTH_USERNAME",
            ConfigValue::from(config.web_username.as_str()),
        ),
        (
            "ME_CONFIG_BASICAUTH_PASSWORD",
            ConfigValue::from(password.as_str()),
        ),
        (
            "ME_CONFIG_OPTIONS_EDITORTHEME",
            ConfigValue::from(config.editor_theme.as_ref()),
        ),
        ("ME_CONFIG_OPTIONS_READONLY", config.read_only.clone()),
        ("ME_CONFIG_SITE_GRIDFS_ENABLED", config.enable_gridfs.clone()),
        ("VCAP_APP_PORT", ConfigValue::from(options.listen_port)),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value))
    .collect();

    Layer {
        summary: "mongo express layer".to_owned(),
        description: "pebble config layer for mongo-express".to_owned(),
        services: BTreeMap::from([(
            SERVICE_NAME.to_owned(),
            Service {
                override_: Override::Replace,
                summary: "mongo-express service".to_owned(),
                command: options.command.clone(),
                startup: Startup::Enabled,
                environment,
            },
        )]),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::config::theme::EditorTheme;

    fn charm_config() -> CharmConfig {
        CharmConfig {
            editor_theme: EditorTheme::Dracula,
            web_username: "admin".to_owned(),
            read_only: ConfigValue::Bool(true),
            enable_gridfs: ConfigValue::Bool(false),
        }
    }

    #[test]
    fn layer_carries_credentials_and_options() {
        let password = WebPassword::from("a1b2c3d4e5f60718293a4b5c6d7e8f90");
        let layer = build_layer(&CharmOptions::default(), &charm_config(), &password);
        let service = &layer.services[SERVICE_NAME];
        let env = |name: &str| service.environment.get(name).cloned();

        assert_eq!(service.override_, Override::Replace);
        assert_eq!(service.startup, Startup::Enabled);
        assert_eq!(service.command, "tini -s -- /docker-entrypoint.sh");
        assert_eq!(
            env("ME_CONFIG_BASICAUTH_USERNAME"),
            Some(ConfigValue::from("admin"))
        );
        assert_eq!(
            env("ME_CONFIG_BASICAUTH_PASSWORD"),
            Some(ConfigValue::from("a1b2c3d4e5f60718293a4b5c6d7e8f90"))
        );
        assert_eq!(
            env("ME_CONFIG_OPTIONS_EDITORTHEME"),
            Some(ConfigValue::from("dracula"))
        );
        assert_eq!(env("ME_CONFIG_OPTIONS_READONLY"), Some(ConfigValue::Bool(true)));
        assert_eq!(
            env("ME_CONFIG_SITE_GRIDFS_ENABLED"),
            Some(ConfigValue::Bool(false))
        );
        assert_eq!(
            env("ME_CONFIG_MONGODB_SERVER"),
            Some(ConfigValue::from("mongodb-k8s-0.mongodb-k8s-endpoints"))
        );
        assert_eq!(env("ME_CONFIG_MONGODB_PORT"), Some(ConfigValue::Int(27017)));
        assert_eq!(
            env("ME_CONFIG_MONGODB_ENABLE_ADMIN"),
            Some(ConfigValue::Bool(true))
        );
        assert_eq!(env("VCAP_APP_PORT"), Some(ConfigValue::Int(8081)));
    }

    #[test]
    fn layer_serializes_as_pebble_yaml() {
        let options = CharmOptions {
            mongodb_server: "mongodb".to_owned(),
            ..CharmOptions::default()
        };
        let layer = build_layer(&options, &charm_config(), &WebPassword::from("secret"));

        let yaml = layer.to_yaml().expect("layer serializes");

        assert_eq!(
            yaml,
            indoc! {"
                summary: mongo express layer
                description: pebble config layer for mongo-express
                services:
                  mongo-express:
                    override: replace
                    summary: mongo-express service
                    command: tini -s -- /docker-entrypoint.sh
                    startup: enabled
                    environment:
                      ME_CONFIG_BASICAUTH_PASSWORD: secret
                      ME_CONFIG_BASICAUTH_USERNAME: admin
                      ME_CONFIG_MONGODB_ENABLE_ADMIN: true
                      ME_CONFIG_MONGODB_PORT: 27017
                      ME_CONFIG_MONGODB_SERVER: mongodb
                      ME_CONFIG_OPTIONS_EDITORTHEME: dracula
                      ME_CONFIG_OPTIONS_READONLY: true
                      ME_CONFIG_SITE_BASEURL: /
                      ME_CONFIG_SITE_COOKIESECRET: cookiesecret
                      ME_CONFIG_SITE_GRIDFS_ENABLED: false
                      ME_CONFIG_SITE_SESSIONSECRET: sessionsecret
                      VCAP_APP_PORT: 8081
            "}
        );

        let parsed: Layer = serde_yaml::from_str(&yaml).expect("rendered layer parses");
        assert_eq!(parsed, layer);
    }

    #[test]
    fn merge_override_extends_environment() {
        let mut service = Service {
            command: "run".to_owned(),
            environment: BTreeMap::from([("A".to_owned(), ConfigValue::from("1"))]),
            ..Service::default()
        };

        service.merge(&Service {
            override_: Override::Merge,
            environment: BTreeMap::from([("B".to_owned(), ConfigValue::from("2"))]),
            ..Service::default()
        });

        assert_eq!(service.command, "run");
        assert_eq!(service.environment.len(), 2);
    }
}
