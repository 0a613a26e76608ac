//! Atomic whole-file replacement.
//!
//! Content is written to a temporary file in the target's directory, given
//! the target's permission bits and ownership, flushed, and renamed over the
//! target. Readers see either the old file or the new one, never a mix.

use std::fs::{self, File, Permissions};
use std::io::{self, Write as IoWrite};
use std::os::unix::fs::{MetadataExt, PermissionsExt, fchown};

use camino::Utf8Path;
use nix::unistd::{Group, User};
use tracing::warn;

use warden_config::DocumentIdentity;

use crate::error::EngineError;

const COMMIT_TARGET: &str = "warden::commit";

/// Ownership and mode carried over to the replacement file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FileAttributes {
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
}

impl FileAttributes {
    fn of_existing(path: &Utf8Path) -> Self {
        match fs::metadata(path) {
            Ok(metadata) => Self {
                mode: Some(metadata.mode() & 0o7777),
                uid: Some(metadata.uid()),
                gid: Some(metadata.gid()),
            },
            Err(_) => Self::default(),
        }
    }

    fn with_identity(self, identity: &DocumentIdentity) -> Self {
        Self {
            mode: identity.mode().or(self.mode),
            uid: identity.owner().map(resolve_user).or(self.uid),
            gid: identity.group().map(resolve_group).or(self.gid),
        }
    }

    fn apply(self, file: &File, path: &Utf8Path) -> Result<(), EngineError> {
        if let Some(mode) = self.mode {
            file.set_permissions(Permissions::from_mode(mode))
                .map_err(|source| EngineError::write(path, source))?;
        }
        let current = file
            .metadata()
            .map_err(|source| EngineError::write(path, source))?;
        let uid = self.uid.filter(|uid| *uid != current.uid());
        let gid = self.gid.filter(|gid| *gid != current.gid());
        if uid.is_none() && gid.is_none() {
            return Ok(());
        }
        if let Err(error) = fchown(file, uid, gid) {
            warn!(
                target: COMMIT_TARGET,
                file = %path,
                uid = ?uid,
                gid = ?gid,
                error = %error,
                "could not carry ownership over to replacement file"
            );
        }
        Ok(())
    }
}

fn resolve_user(name: &str) -> u32 {
    match User::from_name(name) {
        Ok(Some(user)) => user.uid.as_raw(),
        _ => {
            warn!(target: COMMIT_TARGET, owner = name, "unknown owner; falling back to root");
            0
        }
    }
}

fn resolve_group(name: &str) -> u32 {
    match Group::from_name(name) {
        Ok(Some(group)) => group.gid.as_raw(),
        _ => {
            warn!(target: COMMIT_TARGET, group = name, "unknown group; falling back to root");
            0
        }
    }
}

/// Replaces `path` with `content`, keeping the previous file's mode and
/// ownership.
///
/// # Errors
///
/// Returns [`EngineError::Write`] when the temporary file cannot be created,
/// written or renamed into place.
pub(crate) fn write_atomic(path: &Utf8Path, content: &str) -> Result<(), EngineError> {
    replace(path, content, FileAttributes::of_existing(path))
}

/// Replaces `path` with `content`, applying the configured identity over
/// the previous file's attributes.
///
/// # Errors
///
/// Returns [`EngineError::Write`] when the replacement cannot be written.
pub(crate) fn write_with_identity(
    path: &Utf8Path,
    content: &str,
    identity: &DocumentIdentity,
) -> Result<(), EngineError> {
    let attributes = FileAttributes::of_existing(path).with_identity(identity);
    replace(path, content, attributes)
}

/// Removes `path`, treating absence as success. Returns whether a file was
/// removed.
pub(crate) fn remove_if_present(path: &Utf8Path) -> Result<bool, EngineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(EngineError::remove(path, source)),
    }
}

fn replace(path: &Utf8Path, content: &str, attributes: FileAttributes) -> Result<(), EngineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|source| EngineError::write(path, source))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|source| EngineError::write(path, source))?;
    attributes.apply(temp_file.as_file(), path)?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|source| EngineError::write(path, source))?;
    temp_file
        .persist(path)
        .map_err(|error| EngineError::write(path, error.error))?;
    Ok(())
}
