//! Transactional application of the patch stages.
//!
//! A transaction takes the host lock, validates and snapshots the document,
//! then runs each stage in order. Every stage's output is validated before
//! it is written, and the on-disk document is validated once more after the
//! last stage. The service is restarted only when the document's fingerprint
//! changed. Any failure after the snapshot restores it; the lock is released
//! on every path when its guard drops.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use warden_config::{Config, RuntimePaths};
use warden_syntax::{ConfigDocument, IntegrityValidator, ValidationReport};

use crate::backup::{BackupManager, BackupSnapshot, RetentionPolicy, TRANSACTION_BACKUP_PREFIX};
use crate::commit;
use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::lock::{HostLock, LockAttempt};
use crate::patch::{ChangeRecord, DocumentPatcher};
use crate::reporter::TransactionReporter;
use crate::resources::HostResources;
use crate::service::ServiceController;
use crate::stages::PatchStage;

/// Stage name used when validating the document before any stage runs.
pub const PRE_VALIDATION_STAGE: &str = "pre-validation";
/// Stage name used when validating the written document after all stages.
pub const POST_VALIDATION_STAGE: &str = "post-validation";

/// Result of a transaction that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// Another invocation holds the host lock; nothing was done.
    LockContended,
    /// The stages left the document byte-identical; no restart.
    Unchanged {
        /// Records produced by the stages, all skips.
        changes: Vec<ChangeRecord>,
    },
    /// The document changed and the service restarted.
    Restarted {
        /// Records produced by the stages.
        changes: Vec<ChangeRecord>,
        /// Fingerprint of the committed document.
        fingerprint: Fingerprint,
    },
    /// Changes were computed but nothing was written.
    DryRun {
        /// Records the stages would produce.
        changes: Vec<ChangeRecord>,
    },
}

impl TransactionOutcome {
    /// Change records carried by the outcome.
    #[must_use]
    pub fn changes(&self) -> &[ChangeRecord] {
        match self {
            Self::LockContended => &[],
            Self::Unchanged { changes }
            | Self::Restarted { changes, .. }
            | Self::DryRun { changes } => changes,
        }
    }

    /// Returns `true` when the service was restarted.
    #[must_use]
    pub const fn restarted(&self) -> bool {
        matches!(self, Self::Restarted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Commit,
    Plan,
}

/// Runs patch stages against the managed document with rollback.
pub struct TransactionController<'a> {
    document_path: Utf8PathBuf,
    paths: RuntimePaths,
    validator: IntegrityValidator,
    backups: BackupManager,
    retention: RetentionPolicy,
    stages: Vec<Box<dyn PatchStage>>,
    service: &'a dyn ServiceController,
    resources: &'a dyn HostResources,
    reporter: &'a dyn TransactionReporter,
}

impl<'a> TransactionController<'a> {
    /// Creates a controller for the document and directories in `config`.
    #[must_use]
    pub fn new(
        config: &Config,
        stages: Vec<Box<dyn PatchStage>>,
        service: &'a dyn ServiceController,
        resources: &'a dyn HostResources,
        reporter: &'a dyn TransactionReporter,
    ) -> Self {
        Self {
            document_path: config.document_path().to_path_buf(),
            paths: RuntimePaths::from_config(config),
            validator: IntegrityValidator::new(
                config.min_document_bytes(),
                config.listener_keyword(),
            ),
            backups: BackupManager::new(config.backup_dir(), TRANSACTION_BACKUP_PREFIX),
            retention: RetentionPolicy::KeepNewest(config.backup_keep()),
            stages,
            service,
            resources,
            reporter,
        }
    }

    /// Applies every stage, committing and restarting as needed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for every fatal path; any error raised after
    /// the snapshot was taken leaves the snapshot's content on disk. Once the
    /// service has restarted on the new document, failing to record its
    /// fingerprint is logged rather than returned.
    pub fn run(&self) -> Result<TransactionOutcome, EngineError> {
        self.execute(Mode::Commit)
    }

    /// Computes the change records without writing, snapshotting or
    /// restarting.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the document is missing or a stage's
    /// output would fail validation.
    pub fn dry_run(&self) -> Result<TransactionOutcome, EngineError> {
        self.execute(Mode::Plan)
    }

    fn execute(&self, mode: Mode) -> Result<TransactionOutcome, EngineError> {
        self.paths.ensure_directories()?;
        let lock_path = self.paths.lock_path();
        let _lock = match HostLock::try_acquire(&lock_path)? {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Contended { holder } => {
                self.reporter.lock_contended(&lock_path, holder);
                return Ok(TransactionOutcome::LockContended);
            }
        };
        if mode == Mode::Commit {
            ensure_service(self.service)?;
        }

        let original = read_document(&self.document_path)?;
        self.validate(PRE_VALIDATION_STAGE, &original)?;
        let before = Fingerprint::of_file(&self.document_path)?;
        self.note_drift(&before)?;

        if mode == Mode::Plan {
            let (_, changes) = self.patch(original, Mode::Plan)?;
            return Ok(TransactionOutcome::DryRun { changes });
        }

        let snapshot = self.backups.snapshot(&self.document_path)?;
        self.reporter.snapshot_created(&snapshot);

        let committed = self.commit_stages(original).and_then(|changes| {
            Fingerprint::of_file(&self.document_path).map(|after| (changes, after))
        });
        let (changes, after) = match committed {
            Ok(pair) => pair,
            Err(error) => {
                self.roll_back(&snapshot, &error);
                return Err(error);
            }
        };

        let outcome = if after == before {
            self.remember(&after)?;
            TransactionOutcome::Unchanged { changes }
        } else {
            self.restart(&snapshot)?;
            // The new document is already live and stays in place.
            if let Err(error) = self.remember(&after) {
                warn!(
                    target: "warden::transaction",
                    error = %error,
                    "service restarted but the applied fingerprint was not recorded"
                );
            }
            TransactionOutcome::Restarted {
                changes,
                fingerprint: after,
            }
        };
        self.prune(&snapshot);
        Ok(outcome)
    }

    fn commit_stages(&self, original: ConfigDocument) -> Result<Vec<ChangeRecord>, EngineError> {
        let (_, changes) = self.patch(original, Mode::Commit)?;
        let written = read_document(&self.document_path)?;
        self.validate(POST_VALIDATION_STAGE, &written)?;
        Ok(changes)
    }

    fn patch(
        &self,
        original: ConfigDocument,
        mode: Mode,
    ) -> Result<(ConfigDocument, Vec<ChangeRecord>), EngineError> {
        let mut current = original;
        let mut changes = Vec::new();
        for stage in &self.stages {
            let name = stage.name();
            let mut patcher = DocumentPatcher::new(current.clone());
            stage.apply(&mut patcher, self.resources)?;
            let (patched, records) = patcher.finish();
            for record in &records {
                self.reporter.change_recorded(name, record);
            }
            self.validate(name, &patched)?;
            if mode == Mode::Commit && patched != current {
                commit::write_atomic(&self.document_path, &patched.render())?;
                let edits = records.iter().filter(|record| record.is_edit()).count();
                self.reporter.stage_committed(name, edits);
            }
            changes.extend(records);
            current = patched;
        }
        Ok((current, changes))
    }

    fn validate(
        &self,
        stage: &str,
        document: &ConfigDocument,
    ) -> Result<ValidationReport, EngineError> {
        validate_stage(
            &self.validator,
            self.reporter,
            stage,
            &self.document_path,
            document,
        )
    }

    fn note_drift(&self, current: &Fingerprint) -> Result<(), EngineError> {
        if let Some(recorded) = Fingerprint::load(&self.paths.applied_fingerprint_path())?
            && recorded != *current
        {
            self.reporter.external_drift(&recorded, current);
        }
        Ok(())
    }

    fn remember(&self, fingerprint: &Fingerprint) -> Result<(), EngineError> {
        let path = self.paths.applied_fingerprint_path();
        if Fingerprint::load(&path)?.as_ref() != Some(fingerprint) {
            fingerprint.store(&path)?;
        }
        Ok(())
    }

    fn restart(&self, snapshot: &BackupSnapshot) -> Result<(), EngineError> {
        restart_or_restore(self.service, self.reporter, snapshot, &self.document_path)
    }

    fn roll_back(&self, snapshot: &BackupSnapshot, cause: &EngineError) {
        match BackupManager::restore(snapshot, &self.document_path) {
            Ok(()) => self.reporter.rolled_back(snapshot, cause),
            Err(error) => self.reporter.rollback_failed(snapshot, &error),
        }
    }

    fn prune(&self, protect: &BackupSnapshot) {
        match self.backups.prune(self.retention, Some(protect)) {
            Ok(0) => {}
            Ok(removed) => self.reporter.snapshots_pruned(removed),
            Err(error) => warn!(
                target: "warden::backup",
                error = %error,
                "failed to prune transaction snapshots"
            ),
        }
    }
}

/// Validates `document`, reporting the result under `stage`.
pub(crate) fn validate_stage(
    validator: &IntegrityValidator,
    reporter: &dyn TransactionReporter,
    stage: &str,
    path: &Utf8Path,
    document: &ConfigDocument,
) -> Result<ValidationReport, EngineError> {
    match validator.validate(document) {
        Ok(report) => {
            reporter.validation_passed(stage, &report);
            Ok(report)
        }
        Err(source) => {
            reporter.validation_failed(stage, &source);
            Err(EngineError::corruption(stage, path, source))
        }
    }
}

/// Restarts the service. On failure the document is restored from
/// `snapshot` and one more restart is attempted so the service comes back on
/// the previous content.
pub(crate) fn restart_or_restore(
    service: &dyn ServiceController,
    reporter: &dyn TransactionReporter,
    snapshot: &BackupSnapshot,
    document_path: &Utf8Path,
) -> Result<(), EngineError> {
    let Err(source) = service.restart() else {
        reporter.restart_succeeded();
        return Ok(());
    };
    reporter.restart_failed(&source);
    let restored = BackupManager::restore(snapshot, document_path);
    if let Err(retry) = service.restart() {
        reporter.restart_failed(&retry);
    }
    let error = EngineError::RestartFailure {
        path: document_path.to_path_buf(),
        rolled_back: restored.is_ok(),
        source,
    };
    match restored {
        Ok(()) => reporter.rolled_back(snapshot, &error),
        Err(rollback) => reporter.rollback_failed(snapshot, &rollback),
    }
    Err(error)
}

/// Fails with [`EngineError::ServiceUnavailable`] when `service` cannot run.
pub(crate) fn ensure_service(service: &dyn ServiceController) -> Result<(), EngineError> {
    service
        .ensure_available()
        .map_err(|source| EngineError::ServiceUnavailable { source })
}

/// Reads and parses the managed document.
///
/// # Errors
///
/// Returns [`EngineError::PreconditionMissing`] when the document does not
/// exist and [`EngineError::Read`] when it cannot be read.
pub fn read_document(path: &Utf8Path) -> Result<ConfigDocument, EngineError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(ConfigDocument::parse(&text)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(EngineError::PreconditionMissing {
                what: "managed document",
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(EngineError::read(path, source)),
    }
}
