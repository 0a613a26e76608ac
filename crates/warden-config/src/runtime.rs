//! Derives the on-disk layout shared by every warden mode.
//!
//! The state directory holds the host lock and the fingerprint of the last
//! applied transaction; the freeze directory holds the freeze marker, the
//! captured prefix and its fingerprint. Every mode must agree on these names
//! so a freeze taken by one invocation is enforced by the next.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::Config;

/// Name of the host lock file inside the state directory.
pub const LOCK_FILE_NAME: &str = "warden.lock";
/// Name of the applied fingerprint file inside the state directory.
pub const APPLIED_FINGERPRINT_FILE_NAME: &str = "applied.sha256";
/// Name of the freeze marker inside the freeze directory.
pub const FREEZE_MARKER_FILE_NAME: &str = "frozen";
/// Name of the captured prefix inside the freeze directory.
pub const FREEZE_PREFIX_FILE_NAME: &str = "frozen.prefix";
/// Name of the freeze fingerprint inside the freeze directory.
pub const FREEZE_FINGERPRINT_FILE_NAME: &str = "frozen.sha256";

/// Canonical paths for warden's state files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    state_dir: Utf8PathBuf,
    backup_dir: Utf8PathBuf,
    freeze_dir: Utf8PathBuf,
}

impl RuntimePaths {
    /// Derives paths from configuration without touching the filesystem.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            state_dir: config.state_dir().to_path_buf(),
            backup_dir: config.backup_dir().to_path_buf(),
            freeze_dir: config.freeze_dir().to_path_buf(),
        }
    }

    /// Creates the state, backup and freeze directories when missing.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimePathsError::CreateDirectory`] naming the directory
    /// that could not be created.
    pub fn ensure_directories(&self) -> Result<(), RuntimePathsError> {
        for dir in [&self.state_dir, &self.backup_dir, &self.freeze_dir] {
            fs::create_dir_all(dir).map_err(|source| RuntimePathsError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Directory holding the lock and applied fingerprint.
    #[must_use]
    pub fn state_dir(&self) -> &Utf8Path {
        &self.state_dir
    }

    /// Directory receiving transaction snapshots.
    #[must_use]
    pub fn backup_dir(&self) -> &Utf8Path {
        &self.backup_dir
    }

    /// Directory holding freeze state and freeze snapshots.
    #[must_use]
    pub fn freeze_dir(&self) -> &Utf8Path {
        &self.freeze_dir
    }

    /// Host lock file.
    #[must_use]
    pub fn lock_path(&self) -> Utf8PathBuf {
        self.state_dir.join(LOCK_FILE_NAME)
    }

    /// Fingerprint of the last committed transaction.
    #[must_use]
    pub fn applied_fingerprint_path(&self) -> Utf8PathBuf {
        self.state_dir.join(APPLIED_FINGERPRINT_FILE_NAME)
    }

    /// Freeze marker.
    #[must_use]
    pub fn freeze_marker_path(&self) -> Utf8PathBuf {
        self.freeze_dir.join(FREEZE_MARKER_FILE_NAME)
    }

    /// Captured frozen prefix.
    #[must_use]
    pub fn freeze_prefix_path(&self) -> Utf8PathBuf {
        self.freeze_dir.join(FREEZE_PREFIX_FILE_NAME)
    }

    /// Fingerprint of the document as last frozen or enforced.
    #[must_use]
    pub fn freeze_fingerprint_path(&self) -> Utf8PathBuf {
        self.freeze_dir.join(FREEZE_FINGERPRINT_FILE_NAME)
    }
}

/// Errors raised while preparing runtime directories.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating a runtime directory failed.
    #[error("failed to prepare directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
