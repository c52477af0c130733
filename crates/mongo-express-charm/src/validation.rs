//! Validation of the charm config before anything is rendered for the workload.
//!
//! Validation stops at the first problem. The resulting [`ConfigError`] is shown to the user as
//! the unit's blocked status, so it always names exactly one config key.
use std::str::FromStr;

use snafu::Snafu;
use strum::IntoEnumIterator;

use crate::config::{ConfigKey, ConfigValue, RawConfig, theme::EditorTheme};

/// A user fixable problem with the charm config.
#[derive(Clone, Debug, Eq, PartialEq, Snafu)]
pub enum ConfigError {
    #[snafu(display("{key}: missing configuration."))]
    MissingConfiguration { key: ConfigKey },

    #[snafu(display("{key}: invalid value."))]
    InvalidValue { key: ConfigKey },
}

impl ConfigError {
    /// The config key the user has to fix.
    pub fn key(&self) -> ConfigKey {
        match self {
            Self::MissingConfiguration { key } | Self::InvalidValue { key } => *key,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingConfiguration { .. } => "missing configuration.",
            Self::InvalidValue { .. } => "invalid value.",
        }
    }
}

/// Charm config which passed [`validate`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CharmConfig {
    pub editor_theme: EditorTheme,
    pub web_username: String,
    pub read_only: ConfigValue,
    pub enable_gridfs: ConfigValue,
}

/// Returns the typed config if every required key is present and `editor-theme` names a known
/// theme.
///
/// Required keys are checked in [`ConfigKey`] declaration order and only the first missing key
/// is reported.
pub fn validate(config: &RawConfig) -> Result<CharmConfig, ConfigError> {
    if let Some(key) = ConfigKey::iter().find(|key| !config.contains_key(key.as_ref())) {
        return MissingConfigurationSnafu { key }.fail();
    }

    let value = |key: ConfigKey| {
        config
            .get(key.as_ref())
            .cloned()
            .ok_or(ConfigError::MissingConfiguration { key })
    };

    let editor_theme = match value(ConfigKey::EditorTheme)? {
        ConfigValue::String(theme) => EditorTheme::from_str(&theme).ok(),
        _ => None,
    }
    .ok_or(ConfigError::InvalidValue {
        key: ConfigKey::EditorTheme,
    })?;

    tracing::debug!(%editor_theme, "charm configuration checked");

    Ok(CharmConfig {
        editor_theme,
        web_username: value(ConfigKey::WebUsername)?.to_string(),
        read_only: value(ConfigKey::ReadOnly)?,
        enable_gridfs: value(ConfigKey::EnableGridfs)?,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn valid_config() -> RawConfig {
        [
            ("editor-theme", ConfigValue::from("default")),
            ("web-username", ConfigValue::from("admin")),
            ("read-only", ConfigValue::Bool(true)),
            ("enable-gridfs", ConfigValue::Bool(false)),
        ]
        .into_iter()
        .collect()
    }

    #[rstest]
    #[case::editor_theme(ConfigKey::EditorTheme, "editor-theme: missing configuration.")]
    #[case::web_username(ConfigKey::WebUsername, "web-username: missing configuration.")]
    #[case::read_only(ConfigKey::ReadOnly, "read-only: missing configuration.")]
    #[case::enable_gridfs(ConfigKey::EnableGridfs, "enable-gridfs: missing configuration.")]
    fn missing_key_is_reported(#[case] missing: ConfigKey, #[case] expected: &str) {
        let mut config = valid_config();
        config.remove(missing.as_ref());

        let error = validate(&config).expect_err("config is missing a key");
        assert_eq!(error.key(), missing);
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn missing_key_wins_over_invalid_theme() {
        let mut config = valid_config();
        config.insert("editor-theme", "wrong value");
        config.remove("enable-gridfs");

        assert_eq!(
            validate(&config),
            Err(ConfigError::MissingConfiguration {
                key: ConfigKey::EnableGridfs
            })
        );
    }

    #[test]
    fn only_first_missing_key_is_reported() {
        let config: RawConfig = [("enable-gridfs", false)].into_iter().collect();

        let error = validate(&config).expect_err("config is missing keys");
        assert_eq!(error.to_string(), "editor-theme: missing configuration.");
    }

    #[rstest]
    #[case::unknown(ConfigValue::from("wrong value"))]
    #[case::wrong_case(ConfigValue::from("Monokai"))]
    #[case::not_a_string(ConfigValue::Bool(true))]
    fn invalid_editor_theme(#[case] theme: ConfigValue) {
        let mut config = valid_config();
        config.insert("editor-theme", theme);

        let error = validate(&config).expect_err("theme is invalid");
        assert_eq!(error.to_string(), "editor-theme: invalid value.");
        assert_eq!(error.reason(), "invalid value.");
    }

    #[test]
    fn valid_config_is_typed() {
        let mut config = valid_config();
        config.insert("editor-theme", "dracula");

        assert_eq!(
            validate(&config),
            Ok(CharmConfig {
                editor_theme: EditorTheme::Dracula,
                web_username: "admin".to_owned(),
                read_only: ConfigValue::Bool(true),
                enable_gridfs: ConfigValue::Bool(false),
            })
        );
    }

    #[test]
    fn charm_defaults_are_valid() {
        assert!(validate(&RawConfig::charm_defaults()).is_ok());
    }
}
