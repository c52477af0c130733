use clap::Parser;
use mongo_express_charm::{
    actions::ActionOutcome,
    cli::{Command, UnitArguments},
    config::theme::EditorTheme,
    logging,
    status::UnitStatus,
    unit::{self, Dispatch, UnitState},
};
use snafu::{ResultExt, Snafu};
use strum::IntoEnumIterator;

const LOG_ENV: &str = "MONGO_EXPRESS_CHARM_LOG";
const APP_NAME: &str = "mongo-express-charm";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to handle {dispatch:?}"))]
    Dispatch {
        source: unit::Error,
        dispatch: Dispatch,
    },

    #[snafu(display("failed to render the workload layer"))]
    RenderLayer { source: unit::Error },

    #[snafu(display("failed to serialize the workload layer"))]
    SerializeLayer { source: serde_yaml::Error },

    #[snafu(display("failed to serialize the action results"))]
    SerializeResults { source: serde_json::Error },

    #[snafu(display("{message}"))]
    ActionFailed { message: String },
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let command = Command::parse();
    logging::initialize_logging(LOG_ENV, APP_NAME).context(InitializeLoggingSnafu)?;

    match command {
        Command::Dispatch(arguments) => run(arguments.dispatch, arguments.unit),
        Command::Action(arguments) => run(Dispatch::Action(arguments.name), arguments.unit),
        Command::RenderLayer(UnitArguments { state, options }) => {
            let layer = UnitState::load(&state)
                .and_then(|state| state.render_layer(&options))
                .context(RenderLayerSnafu)?;
            print!("{}", layer.to_yaml().context(SerializeLayerSnafu)?);
            Ok(())
        }
        Command::Themes => {
            for theme in EditorTheme::iter() {
                println!("{theme}");
            }
            Ok(())
        }
    }
}

fn run(dispatch: Dispatch, UnitArguments { state, options }: UnitArguments) -> Result<(), Error> {
    let (status, outcome) =
        unit::dispatch_with_state(&state, options, dispatch).context(DispatchSnafu { dispatch })?;

    report(&status, outcome)
}

/// Hands the unit status and action results over to the runtime on stdout.
fn report(status: &UnitStatus, outcome: Option<ActionOutcome>) -> Result<(), Error> {
    tracing::info!(%status, "unit status after dispatch");

    match outcome {
        None => {
            println!("{status}");
            Ok(())
        }
        Some(ActionOutcome::Completed(results)) => {
            let results = serde_json::to_string_pretty(&results).context(SerializeResultsSnafu)?;
            println!("{results}");
            Ok(())
        }
        Some(ActionOutcome::Failed(message)) => ActionFailedSnafu { message }.fail(),
    }
}
