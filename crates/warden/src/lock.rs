//! Host-wide mutual exclusion through a PID lock file.
//!
//! The lock file is created with `create_new`, so exactly one invocation can
//! hold it. A second invocation that finds a live holder backs off without
//! error; one that finds a holder whose process has gone reclaims the file.
//! The guard removes the file when dropped, on every exit path.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::error::EngineError;

const LOCK_TARGET: &str = "warden::lock";

/// A lock file whose PID cannot be read yet may belong to a holder that is
/// still writing it; such files are only reclaimed after this grace period.
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(60);

/// Result of a non-blocking lock attempt.
#[derive(Debug)]
pub enum LockAttempt {
    /// The lock is held until the guard is dropped.
    Acquired(HostLock),
    /// Another live invocation holds the lock.
    Contended {
        /// PID recorded by the holder, when readable.
        holder: Option<u32>,
    },
}

/// Guard for the host lock file.
#[derive(Debug)]
pub struct HostLock {
    path: Utf8PathBuf,
    _file: File,
}

impl HostLock {
    /// Attempts to take the lock at `path` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Write`] when the lock file cannot be created,
    /// [`EngineError::Remove`] when a stale lock cannot be cleared, and
    /// [`EngineError::LockHolderCheck`] when the holder's liveness is unknowable.
    pub fn try_acquire(path: &Utf8Path) -> Result<LockAttempt, EngineError> {
        match create(path)? {
            Some(lock) => Ok(LockAttempt::Acquired(lock)),
            None => handle_existing(path),
        }
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for HostLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(
                    target: LOCK_TARGET,
                    file = %self.path,
                    error = %error,
                    "failed to remove lock file"
                );
            }
            _ => debug!(target: LOCK_TARGET, file = %self.path, "released host lock"),
        }
    }
}

fn create(path: &Utf8Path) -> Result<Option<HostLock>, EngineError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true).mode(0o600);
    match options.open(path) {
        Ok(mut file) => {
            let pid = std::process::id();
            writeln!(file, "{pid}")
                .and_then(|()| file.sync_all())
                .map_err(|source| EngineError::write(path, source))?;
            info!(target: LOCK_TARGET, file = %path, pid, "acquired host lock");
            Ok(Some(HostLock {
                path: path.to_path_buf(),
                _file: file,
            }))
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(source) => Err(EngineError::write(path, source)),
    }
}

fn handle_existing(path: &Utf8Path) -> Result<LockAttempt, EngineError> {
    match read_pid(path) {
        Some(pid) if process_alive(pid)? => {
            info!(target: LOCK_TARGET, file = %path, pid, "host lock held by live process");
            return Ok(LockAttempt::Contended { holder: Some(pid) });
        }
        Some(pid) => {
            warn!(target: LOCK_TARGET, file = %path, pid, "reclaiming stale host lock");
        }
        None if recently_modified(path) => {
            info!(
                target: LOCK_TARGET,
                file = %path,
                "host lock is being written by another process"
            );
            return Ok(LockAttempt::Contended { holder: None });
        }
        None => {
            warn!(target: LOCK_TARGET, file = %path, "reclaiming unreadable host lock");
        }
    }
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(EngineError::remove(path, source)),
    }
    // A concurrent invocation may win the race for the reclaimed file.
    Ok(match create(path)? {
        Some(lock) => LockAttempt::Acquired(lock),
        None => LockAttempt::Contended {
            holder: read_pid(path),
        },
    })
}

fn read_pid(path: &Utf8Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

fn recently_modified(path: &Utf8Path) -> bool {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age < UNREADABLE_LOCK_GRACE)
}

fn process_alive(pid: u32) -> Result<bool, EngineError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(source) => Err(EngineError::LockHolderCheck { pid, source }),
    }
}
