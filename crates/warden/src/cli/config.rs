//! Splits configuration flags from the mode subcommand.
//!
//! Flags listed in [`super::CONFIG_CLI_FLAGS`] that precede the subcommand
//! are handed to `ortho_config`; everything from the first other token on is
//! parsed by clap.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use warden_config::Config;

use super::AppError;

/// Source of the resolved configuration.
pub(crate) trait ConfigLoader {
    /// Loads configuration from defaults, file, environment and `args`.
    ///
    /// `args` holds the program name followed by the configuration flags
    /// that appeared before the subcommand.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

/// Loader backed by [`Config::load_from_iter`].
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if super::CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Arguments partitioned between the configuration loader and clap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by configuration flags and their values.
    pub(crate) config_arguments: Vec<OsString>,
    /// Index of the first argument clap should see.
    pub(crate) command_start: usize,
}

impl ConfigArgumentSplit {
    /// Program name followed by the arguments from `command_start` on.
    pub(crate) fn command_arguments(&self, args: &[OsString]) -> Vec<OsString> {
        args.first()
            .into_iter()
            .chain(args.iter().skip(self.command_start.max(1)))
            .cloned()
            .collect()
    }
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };
    let mut config_arguments = vec![program.clone()];
    let mut index = 1;
    while let Some(argument) = args.get(index) {
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                index += 1;
                if needs_value && let Some(value) = args.get(index) {
                    config_arguments.push(value.clone());
                    index += 1;
                }
            }
            FlagAction::Stop => break,
        }
    }
    ConfigArgumentSplit {
        config_arguments,
        command_start: index,
    }
}
