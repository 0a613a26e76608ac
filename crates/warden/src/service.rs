//! Restarting the managed service.

use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Upper bound on how long a restart command may run.
pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(120);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Restarts the service that reads the managed document.
pub trait ServiceController {
    /// Restarts the service, returning once the restart has completed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the service could not be restarted.
    fn restart(&self) -> Result<(), ServiceError>;

    /// Checks that a restart could be attempted at all.
    ///
    /// Called before the document is touched, so a controller that cannot
    /// run never leaves a rewritten document behind it.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unavailable`] when the controller cannot run.
    fn ensure_available(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Errors raised while restarting the managed service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The restart command could not be started.
    #[error("failed to spawn restart command '{command}': {source}")]
    Spawn {
        /// Command line that was run.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The restart command exited unsuccessfully.
    #[error("restart command '{command}' exited with {status}")]
    Failed {
        /// Command line that was run.
        command: String,
        /// Exit status reported by the command.
        status: ExitStatus,
    },
    /// The restart command outlived its time budget and was killed.
    #[error("restart command '{command}' did not finish within {timeout:?}")]
    TimedOut {
        /// Command line that was run.
        command: String,
        /// Budget that was exceeded.
        timeout: Duration,
    },
    /// The restart command's program cannot be found.
    #[error("restart command '{command}' is not runnable: {program} not found")]
    Unavailable {
        /// Command line that would be run.
        command: String,
        /// Program the command line starts with.
        program: String,
    },
    /// Restarts are refused, e.g. by a test double.
    #[error("restart refused: {message}")]
    Refused {
        /// Reason for the refusal.
        message: String,
    },
}

/// Runs a shell command line to restart the service.
#[derive(Debug, Clone)]
pub struct CommandServiceController {
    command: String,
    timeout: Duration,
}

impl CommandServiceController {
    /// Creates a controller running `command` through `/bin/sh -c`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_RESTART_TIMEOUT,
        }
    }

    /// Overrides the time budget for the restart command.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First word of the command line that is not a `NAME=value`
    /// assignment.
    fn program(&self) -> Option<&str> {
        self.command
            .split_whitespace()
            .find(|word| !word.contains('='))
    }

    fn spawn_error(&self, source: io::Error) -> ServiceError {
        ServiceError::Spawn {
            command: self.command.clone(),
            source,
        }
    }
}

impl ServiceController for CommandServiceController {
    fn restart(&self) -> Result<(), ServiceError> {
        debug!(target: "warden::service", command = %self.command, "running restart command");
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|source| self.spawn_error(source))?;
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(|source| self.spawn_error(source))? {
                return if status.success() {
                    Ok(())
                } else {
                    Err(ServiceError::Failed {
                        command: self.command.clone(),
                        status,
                    })
                };
            }
            if Instant::now() >= deadline {
                // The child may exit between the check and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ServiceError::TimedOut {
                    command: self.command.clone(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Resolves the program with the shell's `command -v`, which covers
    /// builtins, `PATH` lookups and explicit paths alike.
    fn ensure_available(&self) -> Result<(), ServiceError> {
        let unavailable = |program: &str| ServiceError::Unavailable {
            command: self.command.clone(),
            program: program.to_owned(),
        };
        let program = self.program().ok_or_else(|| unavailable(""))?;
        let status = Command::new("/bin/sh")
            .arg("-c")
            .arg("command -v \"$1\"")
            .arg("sh")
            .arg(program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| self.spawn_error(source))?;
        if status.success() {
            Ok(())
        } else {
            Err(unavailable(program))
        }
    }
}
