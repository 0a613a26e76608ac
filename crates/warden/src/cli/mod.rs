//! Command-line front end.
//!
//! The binary is a thin mode selector: configuration flags before the
//! subcommand feed the layered loader, the subcommand picks a [`Mode`], and
//! the outcome is summarised on stdout. Exit status is 0 for success and
//! every no-op (including lock contention) and 1 for any fatal error.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ortho_config::OrthoError;
use thiserror::Error;

use crate::engine::{Mode, Warden};
use crate::error::EngineError;
use crate::reporter::StructuredReporter;
use crate::resources::SystemHostResources;
use crate::service::CommandServiceController;
use crate::telemetry::{self, TelemetryError};

mod config;
mod render;

pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
use config::split_config_arguments;

/// Flags consumed by the configuration loader when they precede the mode.
///
/// Keep in sync with the fields of `warden_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--document-path",
    "--state-dir",
    "--backup-dir",
    "--freeze-dir",
    "--min-document-bytes",
    "--backup-keep",
    "--freeze-backup-max-age-secs",
    "--restart-command",
    "--document-owner",
    "--document-group",
    "--document-mode",
    "--listener-keyword",
    "--live-boundary-keyword",
    "--policy-path",
    "--log-filter",
    "--log-format",
];

/// Patches and freezes a live web server configuration.
#[derive(Parser, Debug)]
#[command(name = "warden", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Mode to run; `run` when omitted.
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

/// Modes exposed on the command line.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Applies the patch policy, restarting the service when the document
    /// changed.
    Run {
        /// Reports the changes without writing or restarting.
        #[arg(long)]
        dry_run: bool,
    },
    /// Pins every line before the live boundary.
    Freeze,
    /// Removes the freeze.
    Unfreeze,
    /// Prints freeze state and fingerprints.
    Status,
    /// Restores the frozen prefix if the document changed.
    Enforce,
    /// Checks the live document's structure without taking the lock.
    Verify,
}

impl From<CliCommand> for Mode {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Run { dry_run } => Self::Run { dry_run },
            CliCommand::Freeze => Self::Freeze,
            CliCommand::Unfreeze => Self::Unfreeze,
            CliCommand::Status => Self::Status,
            CliCommand::Enforce => Self::Enforce,
            CliCommand::Verify => Self::Verify,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to write output: {0}")]
    Output(io::Error),
}

/// Runs the CLI with `args`, writing summaries to `stdout` and failures to
/// `stderr`.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    match execute(args, stdout, loader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(target: "warden::cli", error = %error, "invocation failed");
            let _ = writeln!(stderr, "warden: {error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<I, W, L>(args: I, stdout: &mut W, loader: &L) -> Result<(), AppError>
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli = Cli::try_parse_from(split.command_arguments(&args)).map_err(AppError::CliUsage)?;
    let config = loader.load(&split.config_arguments)?;
    telemetry::initialise(&config)?;

    let mode = cli.command.map_or_else(Mode::default, Mode::from);
    let service = CommandServiceController::new(config.restart_command());
    let resources = SystemHostResources::default();
    let reporter = StructuredReporter::new();
    let warden = Warden::new(config, &service, &resources, &reporter)?;
    let outcome = warden.execute(mode)?;
    render::write_outcome(stdout, &outcome).map_err(AppError::Output)
}
