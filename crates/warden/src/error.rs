//! Error taxonomy for the patch and freeze engine.
//!
//! Lock contention and skipped patches are not errors: the first is a
//! successful outcome, the second a change record. Everything here is fatal
//! for the invocation and maps to exit status 1.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use warden_config::{IdentityError, PolicyError, RuntimePathsError};
use warden_syntax::StructuralError;

use crate::service::ServiceError;

/// Errors surfaced by the transaction controller and freeze state machine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A required file was absent before any mutation took place.
    #[error("{what} not found at {path}")]
    PreconditionMissing {
        /// Human-readable name of the missing artefact.
        what: &'static str,
        /// Path that was expected to exist.
        path: Utf8PathBuf,
    },
    /// The service controller cannot run; detected before any mutation.
    #[error("service controller not available: {source}")]
    ServiceUnavailable {
        /// Why the controller cannot run.
        #[source]
        source: ServiceError,
    },
    /// A document failed integrity validation.
    #[error("{stage}: structural corruption in {path}: {source}")]
    StructuralCorruption {
        /// Stage whose output failed validation.
        stage: String,
        /// Document that was validated.
        path: Utf8PathBuf,
        /// Validation failure.
        #[source]
        source: StructuralError,
    },
    /// A patch stage failed before producing a document.
    #[error("stage '{stage}' failed: {message}")]
    StageFailed {
        /// Stage that failed.
        stage: String,
        /// Description of the failure.
        message: String,
    },
    /// The managed service could not be restarted after a change.
    #[error("restart failed after writing {path}; rolled back: {rolled_back}: {source}")]
    RestartFailure {
        /// Document that had been rewritten.
        path: Utf8PathBuf,
        /// Whether the pre-change snapshot was restored.
        rolled_back: bool,
        /// Restart failure.
        #[source]
        source: ServiceError,
    },
    /// Recombining the frozen prefix with the live suffix lost too much
    /// content to be trusted.
    #[error(
        "extracted document has {candidate_lines} lines against {original_lines} live lines; \
         refusing to write"
    )]
    ExtractionAnomaly {
        /// Line count of the recombined candidate.
        candidate_lines: usize,
        /// Line count of the live document.
        original_lines: usize,
    },
    /// The live boundary was the first line, leaving nothing to freeze.
    #[error("'{keyword}' starts the document; the frozen prefix would be empty")]
    EmptyFreezePrefix {
        /// Live boundary keyword.
        keyword: String,
    },
    /// Reading a file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing a file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File being written.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Removing a file failed.
    #[error("failed to remove {path}: {source}")]
    Remove {
        /// File being removed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Probing the process recorded in a lock file failed.
    #[error("failed to check lock holder pid {pid}: {source}")]
    LockHolderCheck {
        /// Recorded process identifier.
        pid: u32,
        /// Underlying errno.
        #[source]
        source: nix::errno::Errno,
    },
    /// Runtime directories could not be prepared.
    #[error(transparent)]
    RuntimePaths(#[from] RuntimePathsError),
    /// The patch policy could not be loaded.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The configured document identity is invalid.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl EngineError {
    /// Creates a read error for `path`.
    pub fn read(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a write error for `path`.
    pub fn write(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Creates a removal error for `path`.
    pub fn remove(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Remove {
            path: path.into(),
            source,
        }
    }

    /// Creates a structural corruption error for `stage`.
    pub fn corruption(
        stage: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
        source: StructuralError,
    ) -> Self {
        Self::StructuralCorruption {
            stage: stage.into(),
            path: path.into(),
            source,
        }
    }

    /// Returns the stage name when the error is attributable to one.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StructuralCorruption { stage, .. } | Self::StageFailed { stage, .. } => {
                Some(stage)
            }
            _ => None,
        }
    }
}
