//! Command line interface of the `mongo-express-charm` binary.
//!
//! The hosting runtime runs the binary once per hook or action:
//!
//! ```text
//! mongo-express-charm dispatch hooks/config-changed --state /var/lib/charm/state.yaml
//! JUJU_DISPATCH_PATH=actions/get-credentials mongo-express-charm dispatch --state state.yaml
//! ```
use std::path::PathBuf;

use clap::{Args, Parser};

use crate::{actions::ActionName, config::CharmOptions, unit::Dispatch};

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(author, version, about)]
pub enum Command {
    /// Handle a hook or action named by the runtime's dispatch path.
    Dispatch(DispatchArguments),

    /// Run an operator action.
    Action(ActionArguments),

    /// Print the Pebble layer the charm would submit for the stored unit state.
    RenderLayer(UnitArguments),

    /// List the editor themes accepted by the `editor-theme` option.
    Themes,
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct DispatchArguments {
    /// Dispatch path such as `hooks/config-changed` or `actions/change-password`.
    #[arg(env = "JUJU_DISPATCH_PATH")]
    pub dispatch: Dispatch,

    #[command(flatten)]
    pub unit: UnitArguments,
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct ActionArguments {
    /// Name of the action, e.g. `get-credentials`.
    pub name: ActionName,

    #[command(flatten)]
    pub unit: UnitArguments,
}

/// Arguments shared by every command operating on a unit.
#[derive(Debug, PartialEq, Eq, Args)]
pub struct UnitArguments {
    /// State file the unit is loaded from and stored to.
    #[arg(long, short = 's', value_name = "FILE", env = "MONGO_EXPRESS_CHARM_STATE")]
    pub state: PathBuf,

    // Flattened structs go last to keep the help headings correct.
    #[command(flatten)]
    pub options: CharmOptions,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::unit::HookEvent;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        Command::command().debug_assert();
    }

    #[rstest]
    #[case::hook_path(
        &["mongo-express-charm", "dispatch", "hooks/config-changed", "--state", "state.yaml"],
        Dispatch::Hook(HookEvent::ConfigChanged)
    )]
    #[case::action_path(
        &["mongo-express-charm", "dispatch", "actions/get-credentials", "-s", "state.yaml"],
        Dispatch::Action(ActionName::GetCredentials)
    )]
    fn parse_dispatch_command(#[case] args: &[&str], #[case] expected: Dispatch) {
        let command = Command::try_parse_from(args).expect("arguments are valid");

        let Command::Dispatch(arguments) = command else {
            unreachable!("dispatch subcommand was given");
        };
        assert_eq!(arguments.dispatch, expected);
        assert_eq!(arguments.unit.state, PathBuf::from("state.yaml"));
        assert_eq!(arguments.unit.options, CharmOptions::default());
    }

    #[test]
    fn options_can_be_overridden() {
        let command = Command::try_parse_from([
            "mongo-express-charm",
            "action",
            "change-password",
            "--state",
            "state.yaml",
            "--mongodb-server",
            "mongo.example.com",
            "--listen-port",
            "9000",
        ])
        .expect("arguments are valid");

        let Command::Action(arguments) = command else {
            unreachable!("action subcommand was given");
        };
        assert_eq!(arguments.name, ActionName::ChangePassword);
        assert_eq!(arguments.unit.options.mongodb_server, "mongo.example.com");
        assert_eq!(arguments.unit.options.listen_port, 9000);
    }

    #[test]
    fn unknown_hook_is_rejected() {
        assert!(
            Command::try_parse_from([
                "mongo-express-charm",
                "dispatch",
                "hooks/upgrade-charm",
                "--state",
                "state.yaml",
            ])
            .is_err()
        );
    }
}
