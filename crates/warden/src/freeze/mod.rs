//! Pins the head of the managed document against external regeneration.
//!
//! Freezing captures every line before the live boundary (the first
//! top-level line introduced by the boundary keyword) and records the whole
//! document's fingerprint. Enforcement later recombines that prefix with the
//! live document's suffix, so edits after the boundary survive while edits
//! to the frozen head are reverted. State lives in three files in the freeze
//! directory; the marker is written last and removed first.

use std::fs;

use camino::Utf8PathBuf;
use time::OffsetDateTime;
use tracing::{debug, warn};

use warden_config::{Config, DocumentIdentity, RuntimePaths};
use warden_syntax::{ConfigDocument, IntegrityValidator, ValidationReport};

use crate::backup::{BackupManager, BackupSnapshot, FREEZE_BACKUP_PREFIX, RetentionPolicy};
use crate::commit;
use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::lock::{HostLock, LockAttempt};
use crate::reporter::TransactionReporter;
use crate::service::ServiceController;
use crate::transaction::{ensure_service, read_document, restart_or_restore, validate_stage};

const FREEZE_TARGET: &str = "warden::freeze";

/// Validation stage name used when freezing.
pub const FREEZE_STAGE: &str = "freeze";
/// Validation stage name used for a recombined candidate.
pub const ENFORCE_STAGE: &str = "enforce";

/// Result of a successful `freeze`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreezeOutcome {
    /// Another invocation holds the host lock.
    LockContended,
    /// The prefix was captured.
    Frozen {
        /// Lines in the captured prefix.
        prefix_lines: usize,
        /// Line of the live boundary, when the document has one.
        boundary: Option<usize>,
        /// Fingerprint of the whole document at freeze time.
        fingerprint: Fingerprint,
    },
}

/// Result of a successful `enforce`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforceOutcome {
    /// Another invocation holds the host lock.
    LockContended,
    /// No freeze is in place.
    NotFrozen,
    /// The live document already carries the frozen prefix.
    Unchanged,
    /// The frozen prefix was written back and the service restarted.
    Restored {
        /// Lines taken from the frozen prefix.
        prefix_lines: usize,
        /// Lines taken from the live document.
        suffix_lines: usize,
        /// Fingerprint of the rewritten document.
        fingerprint: Fingerprint,
    },
}

/// Result of a successful `unfreeze`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfreezeOutcome {
    /// Another invocation holds the host lock.
    LockContended,
    /// Freeze state was removed; zero files means nothing was frozen.
    Released {
        /// Number of state files deleted.
        removed_files: usize,
    },
}

/// Freeze state as observed by `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreezeStatus {
    /// No marker is present.
    Unfrozen,
    /// A freeze is in place.
    Frozen {
        /// Lines in the stored prefix.
        prefix_lines: usize,
        /// Bytes in the stored prefix.
        prefix_bytes: usize,
        /// Fingerprint recorded by the last freeze or enforce.
        fingerprint: Option<Fingerprint>,
    },
}

/// Drives the freeze state machine for one managed document.
pub struct FreezeController<'a> {
    document_path: Utf8PathBuf,
    boundary_keyword: String,
    identity: DocumentIdentity,
    paths: RuntimePaths,
    validator: IntegrityValidator,
    backups: BackupManager,
    retention: RetentionPolicy,
    service: &'a dyn ServiceController,
    reporter: &'a dyn TransactionReporter,
}

impl<'a> FreezeController<'a> {
    /// Creates a controller for the document and freeze directory in
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Identity`] when the configured document mode
    /// is not valid octal.
    pub fn new(
        config: &Config,
        service: &'a dyn ServiceController,
        reporter: &'a dyn TransactionReporter,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            document_path: config.document_path().to_path_buf(),
            boundary_keyword: config.live_boundary_keyword().to_owned(),
            identity: config.document_identity()?,
            paths: RuntimePaths::from_config(config),
            validator: IntegrityValidator::new(
                config.min_document_bytes(),
                config.listener_keyword(),
            ),
            backups: BackupManager::new(config.freeze_dir(), FREEZE_BACKUP_PREFIX),
            retention: RetentionPolicy::KeepYoungerThan(config.freeze_backup_max_age()),
            service,
            reporter,
        })
    }

    /// Captures the prefix before the live boundary and marks the document
    /// frozen.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PreconditionMissing`] when the document is
    /// absent, [`EngineError::StructuralCorruption`] when it does not
    /// validate and [`EngineError::EmptyFreezePrefix`] when the boundary is
    /// the first line.
    pub fn freeze(&self) -> Result<FreezeOutcome, EngineError> {
        let Some(_lock) = self.lock()? else {
            return Ok(FreezeOutcome::LockContended);
        };
        let document = read_document(&self.document_path)?;
        self.validate(FREEZE_STAGE, &document)?;

        let boundary = document.boundary_line(&self.boundary_keyword);
        if document.is_empty() || boundary == Some(1) {
            return Err(EngineError::EmptyFreezePrefix {
                keyword: self.boundary_keyword.clone(),
            });
        }
        let snapshot = self.backups.snapshot(&self.document_path)?;
        self.reporter.snapshot_created(&snapshot);

        let prefix = match boundary {
            Some(line) => document.split_before(line).0,
            None => {
                warn!(
                    target: FREEZE_TARGET,
                    keyword = %self.boundary_keyword,
                    "live boundary not found; freezing the whole document"
                );
                document.clone()
            }
        };
        let fingerprint = Fingerprint::of_file(&self.document_path)?;
        commit::write_atomic(&self.paths.freeze_prefix_path(), &prefix.render())?;
        fingerprint.store(&self.paths.freeze_fingerprint_path())?;
        commit::write_atomic(
            &self.paths.freeze_marker_path(),
            &format!("{}\n", OffsetDateTime::now_utc()),
        )?;

        self.reporter.freeze_captured(prefix.line_count(), boundary);
        self.prune(&snapshot);
        Ok(FreezeOutcome::Frozen {
            prefix_lines: prefix.line_count(),
            boundary,
            fingerprint,
        })
    }

    /// Restores the frozen prefix ahead of the live suffix when the document
    /// changed since the last freeze or enforce.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExtractionAnomaly`] when recombination would
    /// drop more than half the live document, and
    /// [`EngineError::RestartFailure`] when the service rejects the result.
    pub fn enforce(&self) -> Result<EnforceOutcome, EngineError> {
        let Some(_lock) = self.lock()? else {
            return Ok(EnforceOutcome::LockContended);
        };
        if !is_frozen(&self.paths) {
            debug!(target: FREEZE_TARGET, "document is not frozen");
            return Ok(EnforceOutcome::NotFrozen);
        }
        ensure_service(self.service)?;
        let live = read_document(&self.document_path)?;
        let current = Fingerprint::of_file(&self.document_path)?;
        let fingerprint_path = self.paths.freeze_fingerprint_path();
        if Fingerprint::load(&fingerprint_path)?.as_ref() == Some(&current) {
            debug!(target: FREEZE_TARGET, "fingerprint unchanged");
            return Ok(EnforceOutcome::Unchanged);
        }

        let snapshot = self.backups.snapshot(&self.document_path)?;
        self.reporter.snapshot_created(&snapshot);
        let prefix = self.load_prefix()?;
        let suffix = match live.boundary_line(&self.boundary_keyword) {
            Some(line) => live.split_before(line).1,
            None => ConfigDocument::default(),
        };
        let candidate = prefix.concat(&suffix);
        if candidate.line_count() * 2 < live.line_count() {
            return Err(EngineError::ExtractionAnomaly {
                candidate_lines: candidate.line_count(),
                original_lines: live.line_count(),
            });
        }
        self.validate(ENFORCE_STAGE, &candidate)?;

        if Fingerprint::of_document(&candidate) == current {
            current.store(&fingerprint_path)?;
            self.prune(&snapshot);
            return Ok(EnforceOutcome::Unchanged);
        }

        commit::write_with_identity(&self.document_path, &candidate.render(), &self.identity)?;
        restart_or_restore(self.service, self.reporter, &snapshot, &self.document_path)?;
        let fingerprint = Fingerprint::of_file(&self.document_path)?;
        fingerprint.store(&fingerprint_path)?;
        self.reporter
            .freeze_enforced(prefix.line_count(), suffix.line_count());
        self.prune(&snapshot);
        Ok(EnforceOutcome::Restored {
            prefix_lines: prefix.line_count(),
            suffix_lines: suffix.line_count(),
            fingerprint,
        })
    }

    /// Removes all freeze state. Succeeds when nothing is frozen.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Remove`] when a state file cannot be deleted.
    pub fn unfreeze(&self) -> Result<UnfreezeOutcome, EngineError> {
        let Some(_lock) = self.lock()? else {
            return Ok(UnfreezeOutcome::LockContended);
        };
        let mut removed_files = 0;
        for path in [
            self.paths.freeze_marker_path(),
            self.paths.freeze_prefix_path(),
            self.paths.freeze_fingerprint_path(),
        ] {
            if commit::remove_if_present(&path)? {
                removed_files += 1;
            }
        }
        self.reporter.freeze_released(removed_files);
        Ok(UnfreezeOutcome::Released { removed_files })
    }

    /// Reports the freeze state without taking the lock.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] when a present state file cannot be
    /// read.
    pub fn status(&self) -> Result<FreezeStatus, EngineError> {
        if !is_frozen(&self.paths) {
            return Ok(FreezeStatus::Unfrozen);
        }
        let prefix = self.load_prefix()?;
        Ok(FreezeStatus::Frozen {
            prefix_lines: prefix.line_count(),
            prefix_bytes: prefix.byte_len(),
            fingerprint: Fingerprint::load(&self.paths.freeze_fingerprint_path())?,
        })
    }

    fn lock(&self) -> Result<Option<HostLock>, EngineError> {
        self.paths.ensure_directories()?;
        let path = self.paths.lock_path();
        match HostLock::try_acquire(&path)? {
            LockAttempt::Acquired(lock) => Ok(Some(lock)),
            LockAttempt::Contended { holder } => {
                self.reporter.lock_contended(&path, holder);
                Ok(None)
            }
        }
    }

    fn load_prefix(&self) -> Result<ConfigDocument, EngineError> {
        let path = self.paths.freeze_prefix_path();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(ConfigDocument::parse(&text)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::PreconditionMissing {
                    what: "frozen prefix",
                    path,
                })
            }
            Err(source) => Err(EngineError::read(&path, source)),
        }
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

    fn prune(&self, protect: &BackupSnapshot) {
        match self.backups.prune(self.retention, Some(protect)) {
            Ok(0) => {}
            Ok(removed) => self.reporter.snapshots_pruned(removed),
            Err(error) => warn!(
                target: FREEZE_TARGET,
                error = %error,
                "failed to prune freeze snapshots"
            ),
        }
    }
}

/// Returns `true` when the freeze marker for `paths` exists.
#[must_use]
pub fn is_frozen(paths: &RuntimePaths) -> bool {
    paths.freeze_marker_path().is_file()
}
