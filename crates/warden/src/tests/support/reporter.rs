//! Test double for [`TransactionReporter`] that records events for assertions.

use std::sync::Mutex;

use camino::Utf8Path;
use warden_syntax::{StructuralError, ValidationReport};

use crate::backup::BackupSnapshot;
use crate::error::EngineError;
use crate::fingerprint::Fingerprint;
use crate::patch::ChangeRecord;
use crate::reporter::TransactionReporter;
use crate::service::ServiceError;

/// Engine events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedEvent {
    LockContended,
    ValidationPassed(String),
    ValidationFailed(String),
    ExternalDrift,
    SnapshotCreated,
    Change { stage: String, record: String },
    StageCommitted { stage: String, edits: usize },
    RestartSucceeded,
    RestartFailed,
    RolledBack { stage: Option<String> },
    RollbackFailed,
    SnapshotsPruned(usize),
    FreezeCaptured(usize),
    FreezeEnforced { prefix_lines: usize, suffix_lines: usize },
    FreezeReleased(usize),
}

/// Records engine events for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportedEvent>>,
}

impl RecordingReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ReportedEvent> {
        self.events.lock().expect("reporter mutex poisoned").clone()
    }

    /// Returns true when `event` was recorded.
    #[must_use]
    pub fn saw(&self, event: &ReportedEvent) -> bool {
        self.events().contains(event)
    }

    /// Stages that committed, in order.
    #[must_use]
    pub fn committed_stages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportedEvent::StageCommitted { stage, .. } => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ReportedEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl TransactionReporter for RecordingReporter {
    fn lock_contended(&self, _lock: &Utf8Path, _holder: Option<u32>) {
        self.record(ReportedEvent::LockContended);
    }

    fn validation_passed(&self, stage: &str, _report: &ValidationReport) {
        self.record(ReportedEvent::ValidationPassed(stage.to_owned()));
    }

    fn validation_failed(&self, stage: &str, _error: &StructuralError) {
        self.record(ReportedEvent::ValidationFailed(stage.to_owned()));
    }

    fn external_drift(&self, _recorded: &Fingerprint, _current: &Fingerprint) {
        self.record(ReportedEvent::ExternalDrift);
    }

    fn snapshot_created(&self, _snapshot: &BackupSnapshot) {
        self.record(ReportedEvent::SnapshotCreated);
    }

    fn change_recorded(&self, stage: &str, change: &ChangeRecord) {
        self.record(ReportedEvent::Change {
            stage: stage.to_owned(),
            record: change.to_string(),
        });
    }

    fn stage_committed(&self, stage: &str, edits: usize) {
        self.record(ReportedEvent::StageCommitted {
            stage: stage.to_owned(),
            edits,
        });
    }

    fn restart_succeeded(&self) {
        self.record(ReportedEvent::RestartSucceeded);
    }

    fn restart_failed(&self, _error: &ServiceError) {
        self.record(ReportedEvent::RestartFailed);
    }

    fn rolled_back(&self, _snapshot: &BackupSnapshot, cause: &EngineError) {
        self.record(ReportedEvent::RolledBack {
            stage: cause.stage().map(str::to_owned),
        });
    }

    fn rollback_failed(&self, _snapshot: &BackupSnapshot, _error: &EngineError) {
        self.record(ReportedEvent::RollbackFailed);
    }

    fn snapshots_pruned(&self, removed: usize) {
        self.record(ReportedEvent::SnapshotsPruned(removed));
    }

    fn freeze_captured(&self, prefix_lines: usize, _boundary: Option<usize>) {
        self.record(ReportedEvent::FreezeCaptured(prefix_lines));
    }

    fn freeze_enforced(&self, prefix_lines: usize, suffix_lines: usize) {
        self.record(ReportedEvent::FreezeEnforced {
            prefix_lines,
            suffix_lines,
        });
    }

    fn freeze_released(&self, removed_files: usize) {
        self.record(ReportedEvent::FreezeReleased(removed_files));
    }
}
