//! Installs the process-wide `tracing` subscriber.
//!
//! Warden runs unattended from a scheduler, so every event goes to stderr
//! with an RFC 3339 UTC timestamp and its target (`warden::transaction`,
//! `warden::freeze`, `warden::lock`, ...). JSON output flattens event fields
//! so log shippers can index them directly.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{EnvFilter, fmt};

use warden_config::{Config, LogFormat};

static TELEMETRY: OnceCell<LogFormat> = OnceCell::new();

/// Proof that the subscriber is installed, carrying the format in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
}

impl TelemetryHandle {
    /// Output format chosen by the first initialisation.
    #[must_use]
    pub const fn format(self) -> LogFormat {
        self.format
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The `log_filter` directive did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Filter expression as configured.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Another subscriber was already installed globally.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Installs the subscriber described by `config` on first use.
///
/// Later calls return the handle of the first installation and ignore their
/// own configuration.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a foreign
/// subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY
        .get_or_try_init(|| install(config))
        .map(|format| TelemetryHandle { format: *format })
}

fn install(config: &Config) -> Result<LogFormat, TelemetryError> {
    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());

    let format = config.log_format();
    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(format)
}
