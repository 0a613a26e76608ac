//! Mode dispatch over the transaction controller and freeze state machine.

use std::fmt;

use warden_config::{Config, PatchPolicy, RuntimePaths};
use warden_syntax::{IntegrityValidator, ValidationReport};

use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::freeze::{
    EnforceOutcome, FreezeController, FreezeOutcome, FreezeStatus, UnfreezeOutcome,
};
use crate::reporter::TransactionReporter;
use crate::resources::HostResources;
use crate::service::ServiceController;
use crate::stages::standard_stages;
use crate::transaction::{
    TransactionController, TransactionOutcome, read_document, validate_stage,
};

/// Stage name used by read-only verification.
pub const VERIFY_STAGE: &str = "verify";

/// Operation requested of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Apply the patch stages; with `dry_run` only report the changes.
    Run {
        /// Compute changes without writing.
        dry_run: bool,
    },
    /// Capture the prefix before the live boundary.
    Freeze,
    /// Drop all freeze state.
    Unfreeze,
    /// Report freeze state and fingerprints.
    Status,
    /// Restore the frozen prefix if the document drifted.
    Enforce,
    /// Validate the live document without taking the lock.
    Verify,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Run { dry_run: false }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Run { dry_run: false } => "run",
            Self::Run { dry_run: true } => "run --dry-run",
            Self::Freeze => "freeze",
            Self::Unfreeze => "unfreeze",
            Self::Status => "status",
            Self::Enforce => "enforce",
            Self::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// Snapshot of everything `status` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Freeze state machine position.
    pub freeze: FreezeStatus,
    /// Fingerprint of the live document, absent when the file is missing.
    pub document: Option<Fingerprint>,
    /// Fingerprint recorded by the last committed transaction.
    pub applied: Option<Fingerprint>,
}

impl StatusReport {
    /// Returns `true` when the live document differs from the last committed
    /// transaction.
    #[must_use]
    pub fn drifted(&self) -> bool {
        matches!((&self.document, &self.applied), (Some(live), Some(applied)) if live != applied)
    }
}

/// Result of [`Warden::execute`], one variant per mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeOutcome {
    /// `run` or `run --dry-run`.
    Transaction(TransactionOutcome),
    /// `freeze`.
    Freeze(FreezeOutcome),
    /// `enforce`.
    Enforce(EnforceOutcome),
    /// `unfreeze`.
    Unfreeze(UnfreezeOutcome),
    /// `status`.
    Status(StatusReport),
    /// `verify`.
    Verify(ValidationReport),
}

/// The engine with its configuration, policy and host collaborators.
pub struct Warden<'a> {
    config: Config,
    policy: PatchPolicy,
    service: &'a dyn ServiceController,
    resources: &'a dyn HostResources,
    reporter: &'a dyn TransactionReporter,
}

impl<'a> Warden<'a> {
    /// Loads the patch policy named by `config` and wires the collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Policy`] when the policy file is unusable.
    pub fn new(
        config: Config,
        service: &'a dyn ServiceController,
        resources: &'a dyn HostResources,
        reporter: &'a dyn TransactionReporter,
    ) -> Result<Self, EngineError> {
        let policy = config.patch_policy()?;
        Ok(Self {
            config,
            policy,
            service,
            resources,
            reporter,
        })
    }

    /// Resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Patch policy in force.
    #[must_use]
    pub const fn policy(&self) -> &PatchPolicy {
        &self.policy
    }

    /// Runs `mode` to completion.
    ///
    /// # Errors
    ///
    /// Propagates the [`EngineError`] of the selected operation.
    pub fn execute(&self, mode: Mode) -> Result<ModeOutcome, EngineError> {
        tracing::debug!(target: "warden::engine", %mode, "executing mode");
        match mode {
            Mode::Run { dry_run } => {
                let controller = self.transaction();
                let outcome = if dry_run {
                    controller.dry_run()?
                } else {
                    controller.run()?
                };
                Ok(ModeOutcome::Transaction(outcome))
            }
            Mode::Freeze => Ok(ModeOutcome::Freeze(self.freeze()?.freeze()?)),
            Mode::Unfreeze => Ok(ModeOutcome::Unfreeze(self.freeze()?.unfreeze()?)),
            Mode::Enforce => Ok(ModeOutcome::Enforce(self.freeze()?.enforce()?)),
            Mode::Status => self.status().map(ModeOutcome::Status),
            Mode::Verify => self.verify().map(ModeOutcome::Verify),
        }
    }

    fn transaction(&self) -> TransactionController<'a> {
        TransactionController::new(
            &self.config,
            standard_stages(&self.policy, self.config.listener_keyword()),
            self.service,
            self.resources,
            self.reporter,
        )
    }

    fn freeze(&self) -> Result<FreezeController<'a>, EngineError> {
        FreezeController::new(&self.config, self.service, self.reporter)
    }

    fn status(&self) -> Result<StatusReport, EngineError> {
        let paths = RuntimePaths::from_config(&self.config);
        let document_path = self.config.document_path();
        let document = if document_path.is_file() {
            Some(Fingerprint::of_file(document_path)?)
        } else {
            None
        };
        Ok(StatusReport {
            freeze: self.freeze()?.status()?,
            document,
            applied: Fingerprint::load(&paths.applied_fingerprint_path())?,
        })
    }

    /// Unlocked, so it may observe a document mid-transaction.
    fn verify(&self) -> Result<ValidationReport, EngineError> {
        let document_path = self.config.document_path();
        let document = read_document(document_path)?;
        let validator = IntegrityValidator::new(
            self.config.min_document_bytes(),
            self.config.listener_keyword(),
        );
        validate_stage(
            &validator,
            self.reporter,
            VERIFY_STAGE,
            document_path,
            &document,
        )
    }
}
