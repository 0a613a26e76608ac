//! Timestamped snapshots of the managed document and their retention.
//!
//! Snapshot names are `<prefix>-YYYYMMDDTHHMMSS.ffffffZ` in UTC, so lexical
//! order matches creation order. Each subsystem owns a prefix; pruning only
//! ever considers files carrying that prefix.

use std::fs;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use time::OffsetDateTime;
use tracing::debug;

use crate::commit;
use crate::error::EngineError;

const BACKUP_TARGET: &str = "warden::backup";

/// Prefix of snapshots taken before a patch transaction.
pub const TRANSACTION_BACKUP_PREFIX: &str = "transaction";

/// Prefix of snapshots taken before freeze and enforce.
pub const FREEZE_BACKUP_PREFIX: &str = "freeze";

/// An immutable copy of the document taken before a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSnapshot {
    path: Utf8PathBuf,
}

impl BackupSnapshot {
    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the snapshot content.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] when the snapshot cannot be read.
    pub fn read(&self) -> Result<String, EngineError> {
        fs::read_to_string(&self.path).map_err(|source| EngineError::read(&self.path, source))
    }
}

/// Which snapshots survive a prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the `n` most recent snapshots.
    KeepNewest(usize),
    /// Keep snapshots modified within the duration.
    KeepYoungerThan(Duration),
}

/// Creates, prunes and restores snapshots under one directory and prefix.
#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: Utf8PathBuf,
    prefix: String,
}

impl BackupManager {
    /// Creates a manager for snapshots named `<prefix>-*` inside `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Copies `document` into a new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PreconditionMissing`] when the document does
    /// not exist and [`EngineError::Write`] when the copy fails.
    pub fn snapshot(&self, document: &Utf8Path) -> Result<BackupSnapshot, EngineError> {
        if !document.is_file() {
            return Err(EngineError::PreconditionMissing {
                what: "managed document",
                path: document.to_path_buf(),
            });
        }
        fs::create_dir_all(&self.dir).map_err(|source| EngineError::write(&self.dir, source))?;
        let mut stamp = OffsetDateTime::now_utc();
        let mut path = self.dir.join(snapshot_name(&self.prefix, stamp));
        while path.exists() {
            stamp += time::Duration::microseconds(1);
            path = self.dir.join(snapshot_name(&self.prefix, stamp));
        }
        fs::copy(document, &path).map_err(|source| EngineError::write(&path, source))?;
        debug!(target: BACKUP_TARGET, snapshot = %path, "snapshot written");
        Ok(BackupSnapshot { path })
    }

    /// Writes a snapshot's content back over `document` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] or [`EngineError::Write`] when the copy
    /// back fails.
    pub fn restore(snapshot: &BackupSnapshot, document: &Utf8Path) -> Result<(), EngineError> {
        let content = snapshot.read()?;
        commit::write_atomic(document, &content)
    }

    /// Snapshots carrying this manager's prefix, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] when the directory cannot be listed.
    pub fn list(&self) -> Result<Vec<BackupSnapshot>, EngineError> {
        let mut entries = self.entries()?;
        entries.sort();
        Ok(entries
            .into_iter()
            .map(|(_, path)| BackupSnapshot { path })
            .collect())
    }

    /// Deletes snapshots outside `policy`, never deleting `protect`.
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Read`] when the directory cannot be listed and
    /// [`EngineError::Remove`] when a snapshot cannot be deleted.
    pub fn prune(
        &self,
        policy: RetentionPolicy,
        protect: Option<&BackupSnapshot>,
    ) -> Result<usize, EngineError> {
        let mut entries = self.entries()?;
        entries.sort();
        let now = SystemTime::now();
        let keep_from = match policy {
            RetentionPolicy::KeepNewest(count) => entries.len().saturating_sub(count),
            RetentionPolicy::KeepYoungerThan(_) => 0,
        };
        let mut removed = 0;
        for (index, (modified, path)) in entries.iter().enumerate() {
            if protect.is_some_and(|snapshot| snapshot.path == *path) {
                continue;
            }
            let expired = match policy {
                RetentionPolicy::KeepNewest(_) => index < keep_from,
                RetentionPolicy::KeepYoungerThan(max_age) => now
                    .duration_since(*modified)
                    .is_ok_and(|age| age > max_age),
            };
            if expired && commit::remove_if_present(path)? {
                debug!(target: BACKUP_TARGET, snapshot = %path, "snapshot pruned");
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entries(&self) -> Result<Vec<(SystemTime, Utf8PathBuf)>, EngineError> {
        let marker = format!("{}-", self.prefix);
        let listing = match fs::read_dir(&self.dir) {
            Ok(listing) => listing,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(EngineError::read(&self.dir, source)),
        };
        let mut entries = Vec::new();
        for entry in listing {
            let entry = entry.map_err(|source| EngineError::read(&self.dir, source))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(&marker) {
                continue;
            }
            let metadata = entry
                .metadata()
                .map_err(|source| EngineError::read(self.dir.join(&name), source))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((modified, self.dir.join(name)));
        }
        Ok(entries)
    }
}

/// Formats a snapshot name for `stamp`.
#[must_use]
pub fn snapshot_name(prefix: &str, stamp: OffsetDateTime) -> String {
    format!(
        "{prefix}-{:04}{:02}{:02}T{:02}{:02}{:02}.{:06}Z",
        stamp.year(),
        u8::from(stamp.month()),
        stamp.day(),
        stamp.hour(),
        stamp.minute(),
        stamp.second(),
        stamp.microsecond()
    )
}
