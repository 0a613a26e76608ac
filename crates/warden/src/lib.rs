//! Patch and freeze engine for a live web server configuration.
//!
//! Two actors rewrite the same brace-delimited configuration file: a local
//! tuning job and a management layer that periodically regenerates parts of
//! it. Warden lets the first apply its policy without ever leaving the file
//! broken, and pins the administrator-owned head of the file against the
//! second.
//!
//! ## Transactions
//!
//! [`TransactionController`] takes the host lock, validates and snapshots
//! the document, then runs the patch stages in a fixed order: top-level
//! directives, logging blocks, tuning, listener TLS. Each stage's output is
//! validated before it is written atomically. Any failure restores the
//! snapshot. The service restarts only when the document's SHA-256
//! fingerprint changed, so a settled host is never disturbed.
//!
//! ## Freeze
//!
//! [`FreezeController`] captures every line before the live boundary (the
//! first `virtualhost` block by default). `enforce` recombines that prefix
//! with whatever the management layer wrote from the boundary onward,
//! refusing when the result would lose more than half the live document.
//!
//! Both flows share the lock, the atomic writer, the backup manager and the
//! [`ServiceController`]; observations flow through a
//! [`TransactionReporter`] so telemetry and tests can watch them.

mod backup;
mod cli;
mod commit;
mod engine;
mod error;
mod fingerprint;
mod freeze;
mod lock;
pub mod patch;
mod reporter;
mod resources;
mod service;
pub mod stages;
mod telemetry;
mod transaction;

pub use backup::{
    BackupManager, BackupSnapshot, FREEZE_BACKUP_PREFIX, RetentionPolicy,
    TRANSACTION_BACKUP_PREFIX,
};
pub use cli::run;
pub use engine::{Mode, ModeOutcome, StatusReport, VERIFY_STAGE, Warden};
pub use error::EngineError;
pub use fingerprint::Fingerprint;
pub use freeze::{
    ENFORCE_STAGE, EnforceOutcome, FREEZE_STAGE, FreezeController, FreezeOutcome, FreezeStatus,
    UnfreezeOutcome, is_frozen,
};
pub use lock::{HostLock, LockAttempt};
pub use reporter::{StructuredReporter, TransactionReporter};
pub use resources::{HostResources, SystemHostResources};
pub use service::{
    CommandServiceController, DEFAULT_RESTART_TIMEOUT, ServiceController, ServiceError,
};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
pub use transaction::{
    POST_VALIDATION_STAGE, PRE_VALIDATION_STAGE, TransactionController, TransactionOutcome,
    read_document,
};

#[cfg(test)]
mod tests;
