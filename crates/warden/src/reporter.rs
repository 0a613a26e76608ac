//! Structured reporting of transaction and freeze lifecycle events.

use std::sync::Arc;

use camino::Utf8Path;
use warden_syntax::{StructuralError, ValidationReport};

use crate::backup::BackupSnapshot;
use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::patch::ChangeRecord;
use crate::service::ServiceError;

const TRANSACTION_TARGET: &str = "warden::transaction";
const FREEZE_TARGET: &str = "warden::freeze";

/// Observer trait used to surface engine events to telemetry sinks.
pub trait TransactionReporter: Send + Sync {
    /// Another invocation holds the host lock; this one does nothing.
    fn lock_contended(&self, lock: &Utf8Path, holder: Option<u32>);

    /// A document passed validation after `stage`.
    fn validation_passed(&self, stage: &str, report: &ValidationReport);

    /// A document failed validation after `stage`.
    fn validation_failed(&self, stage: &str, error: &StructuralError);

    /// The document changed since the last committed transaction.
    fn external_drift(&self, recorded: &Fingerprint, current: &Fingerprint);

    /// A pre-mutation snapshot was written.
    fn snapshot_created(&self, snapshot: &BackupSnapshot);

    /// A primitive produced a change record during `stage`.
    fn change_recorded(&self, stage: &str, change: &ChangeRecord);

    /// The output of `stage` was written to disk.
    fn stage_committed(&self, stage: &str, edits: usize);

    /// The managed service restarted after a change.
    fn restart_succeeded(&self);

    /// The managed service failed to restart.
    fn restart_failed(&self, error: &ServiceError);

    /// The document was restored from `snapshot`.
    fn rolled_back(&self, snapshot: &BackupSnapshot, cause: &EngineError);

    /// Restoring from `snapshot` failed; the document may be inconsistent.
    fn rollback_failed(&self, snapshot: &BackupSnapshot, error: &EngineError);

    /// Old snapshots were deleted.
    fn snapshots_pruned(&self, removed: usize);

    /// A prefix of `prefix_lines` lines was frozen.
    fn freeze_captured(&self, prefix_lines: usize, boundary: Option<usize>);

    /// The frozen prefix was restored ahead of the live suffix.
    fn freeze_enforced(&self, prefix_lines: usize, suffix_lines: usize);

    /// Freeze state was removed.
    fn freeze_released(&self, removed_files: usize);
}

impl<T> TransactionReporter for Arc<T>
where
    T: TransactionReporter + ?Sized,
{
    fn lock_contended(&self, lock: &Utf8Path, holder: Option<u32>) {
        (**self).lock_contended(lock, holder);
    }

    fn validation_passed(&self, stage: &str, report: &ValidationReport) {
        (**self).validation_passed(stage, report);
    }

    fn validation_failed(&self, stage: &str, error: &StructuralError) {
        (**self).validation_failed(stage, error);
    }

    fn external_drift(&self, recorded: &Fingerprint, current: &Fingerprint) {
        (**self).external_drift(recorded, current);
    }

    fn snapshot_created(&self, snapshot: &BackupSnapshot) {
        (**self).snapshot_created(snapshot);
    }

    fn change_recorded(&self, stage: &str, change: &ChangeRecord) {
        (**self).change_recorded(stage, change);
    }

    fn stage_committed(&self, stage: &str, edits: usize) {
        (**self).stage_committed(stage, edits);
    }

    fn restart_succeeded(&self) {
        (**self).restart_succeeded();
    }

    fn restart_failed(&self, error: &ServiceError) {
        (**self).restart_failed(error);
    }

    fn rolled_back(&self, snapshot: &BackupSnapshot, cause: &EngineError) {
        (**self).rolled_back(snapshot, cause);
    }

    fn rollback_failed(&self, snapshot: &BackupSnapshot, error: &EngineError) {
        (**self).rollback_failed(snapshot, error);
    }

    fn snapshots_pruned(&self, removed: usize) {
        (**self).snapshots_pruned(removed);
    }

    fn freeze_captured(&self, prefix_lines: usize, boundary: Option<usize>) {
        (**self).freeze_captured(prefix_lines, boundary);
    }

    fn freeze_enforced(&self, prefix_lines: usize, suffix_lines: usize) {
        (**self).freeze_enforced(prefix_lines, suffix_lines);
    }

    fn freeze_released(&self, removed_files: usize) {
        (**self).freeze_released(removed_files);
    }
}

/// Default reporter that records engine events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReporter;

impl StructuredReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TransactionReporter for StructuredReporter {
    fn lock_contended(&self, lock: &Utf8Path, holder: Option<u32>) {
        tracing::info!(
            target: "warden::lock",
            event = "lock_contended",
            file = %lock,
            holder = ?holder,
            "another invocation holds the host lock; nothing to do"
        );
    }

    fn validation_passed(&self, stage: &str, report: &ValidationReport) {
        tracing::debug!(
            target: TRANSACTION_TARGET,
            event = "validation_passed",
            stage,
            bytes = report.bytes(),
            lines = report.lines(),
            "document validated"
        );
        for warning in report.warnings() {
            tracing::warn!(
                target: TRANSACTION_TARGET,
                event = "validation_warning",
                stage,
                warning = %warning,
                "document validated with a warning"
            );
        }
    }

    fn validation_failed(&self, stage: &str, error: &StructuralError) {
        tracing::error!(
            target: TRANSACTION_TARGET,
            event = "validation_failed",
            stage,
            error = %error,
            "document failed validation"
        );
    }

    fn external_drift(&self, recorded: &Fingerprint, current: &Fingerprint) {
        tracing::warn!(
            target: TRANSACTION_TARGET,
            event = "external_drift",
            recorded = %recorded,
            current = %current,
            "document changed since the last applied transaction"
        );
    }

    fn snapshot_created(&self, snapshot: &BackupSnapshot) {
        tracing::info!(
            target: "warden::backup",
            event = "snapshot_created",
            snapshot = %snapshot.path(),
            "snapshot written"
        );
    }

    fn change_recorded(&self, stage: &str, change: &ChangeRecord) {
        if change.is_edit() {
            tracing::info!(
                target: TRANSACTION_TARGET,
                event = "change",
                stage,
                line = ?change.line(),
                "{change}"
            );
        } else {
            tracing::info!(
                target: TRANSACTION_TARGET,
                event = "patch_skipped",
                stage,
                "{change}"
            );
        }
    }

    fn stage_committed(&self, stage: &str, edits: usize) {
        tracing::info!(
            target: TRANSACTION_TARGET,
            event = "stage_committed",
            stage,
            edits,
            "stage written"
        );
    }

    fn restart_succeeded(&self) {
        tracing::info!(
            target: TRANSACTION_TARGET,
            event = "restart_succeeded",
            "managed service restarted"
        );
    }

    fn restart_failed(&self, error: &ServiceError) {
        tracing::error!(
            target: TRANSACTION_TARGET,
            event = "restart_failed",
            error = %error,
            "managed service failed to restart"
        );
    }

    fn rolled_back(&self, snapshot: &BackupSnapshot, cause: &EngineError) {
        tracing::warn!(
            target: TRANSACTION_TARGET,
            event = "rolled_back",
            snapshot = %snapshot.path(),
            stage = cause.stage().unwrap_or("-"),
            cause = %cause,
            "document restored from snapshot"
        );
    }

    fn rollback_failed(&self, snapshot: &BackupSnapshot, error: &EngineError) {
        tracing::error!(
            target: TRANSACTION_TARGET,
            event = "rollback_failed",
            snapshot = %snapshot.path(),
            error = %error,
            "failed to restore document from snapshot"
        );
    }

    fn snapshots_pruned(&self, removed: usize) {
        tracing::debug!(
            target: "warden::backup",
            event = "snapshots_pruned",
            removed,
            "old snapshots pruned"
        );
    }

    fn freeze_captured(&self, prefix_lines: usize, boundary: Option<usize>) {
        tracing::info!(
            target: FREEZE_TARGET,
            event = "freeze_captured",
            prefix_lines,
            boundary = ?boundary,
            "frozen prefix captured"
        );
    }

    fn freeze_enforced(&self, prefix_lines: usize, suffix_lines: usize) {
        tracing::warn!(
            target: FREEZE_TARGET,
            event = "freeze_enforced",
            prefix_lines,
            suffix_lines,
            "frozen prefix restored over external changes"
        );
    }

    fn freeze_released(&self, removed_files: usize) {
        tracing::info!(
            target: FREEZE_TARGET,
            event = "freeze_released",
            removed_files,
            "freeze state removed"
        );
    }
}
