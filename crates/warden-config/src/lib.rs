//! Shared configuration for the warden engine and binary.
//!
//! Configuration is layered with `ortho_config`: built-in defaults, then a
//! TOML file named by `--config-path` or `WARDEN_CONFIG_PATH`, then
//! `WARDEN_*` environment variables, then command-line flags. Every path,
//! threshold and retention count the engine uses lives here and is handed to
//! components when they are constructed.
//!
//! The directive values the engine writes are not part of [`Config`]; they
//! come from a [`PatchPolicy`] loaded from `policy_path`, or the built-in
//! default policy when no path is configured.

mod defaults;
mod identity;
mod logging;
mod policy;
mod runtime;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use defaults::{
    DEFAULT_BACKUP_DIR, DEFAULT_BACKUP_KEEP, DEFAULT_DOCUMENT_PATH,
    DEFAULT_FREEZE_BACKUP_MAX_AGE_SECS, DEFAULT_FREEZE_DIR, DEFAULT_LISTENER_KEYWORD,
    DEFAULT_LIVE_BOUNDARY_KEYWORD, DEFAULT_LOG_FILTER, DEFAULT_MIN_DOCUMENT_BYTES,
    DEFAULT_RESTART_COMMAND, DEFAULT_STATE_DIR, default_backup_dir, default_backup_keep,
    default_document_path, default_freeze_backup_max_age_secs, default_freeze_dir,
    default_listener_keyword, default_live_boundary_keyword, default_log_filter,
    default_log_filter_string, default_log_format, default_min_document_bytes,
    default_restart_command, default_state_dir,
};
pub use identity::{DocumentIdentity, IdentityError};
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::{FeatureOverride, LoggingBlock, PatchPolicy, PolicyError, TlsPolicy, TuningTier};
pub use runtime::{
    APPLIED_FINGERPRINT_FILE_NAME, FREEZE_FINGERPRINT_FILE_NAME, FREEZE_MARKER_FILE_NAME,
    FREEZE_PREFIX_FILE_NAME, LOCK_FILE_NAME, RuntimePaths, RuntimePathsError,
};

/// Runtime configuration for warden.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "WARDEN")]
pub struct Config {
    /// Managed server configuration document.
    #[serde(default = "defaults::default_document_path")]
    #[ortho_config(default = defaults::default_document_path())]
    pub document_path: Utf8PathBuf,
    /// Directory holding the host lock and the applied fingerprint.
    #[serde(default = "defaults::default_state_dir")]
    #[ortho_config(default = defaults::default_state_dir())]
    pub state_dir: Utf8PathBuf,
    /// Directory receiving transaction snapshots.
    #[serde(default = "defaults::default_backup_dir")]
    #[ortho_config(default = defaults::default_backup_dir())]
    pub backup_dir: Utf8PathBuf,
    /// Directory holding freeze state and freeze snapshots.
    #[serde(default = "defaults::default_freeze_dir")]
    #[ortho_config(default = defaults::default_freeze_dir())]
    pub freeze_dir: Utf8PathBuf,
    /// Documents shorter than this many bytes fail validation.
    #[serde(default = "defaults::default_min_document_bytes")]
    #[ortho_config(default = defaults::default_min_document_bytes())]
    pub min_document_bytes: usize,
    /// Transaction snapshots retained after each run.
    #[serde(default = "defaults::default_backup_keep")]
    #[ortho_config(default = defaults::default_backup_keep())]
    pub backup_keep: usize,
    /// Freeze snapshots older than this many seconds are pruned.
    #[serde(default = "defaults::default_freeze_backup_max_age_secs")]
    #[ortho_config(default = defaults::default_freeze_backup_max_age_secs())]
    pub freeze_backup_max_age_secs: u64,
    /// Shell command that restarts the managed service.
    #[serde(default = "defaults::default_restart_command")]
    #[ortho_config(default = defaults::default_restart_command())]
    pub restart_command: String,
    /// Owner applied when enforce rewrites the document.
    #[serde(default)]
    pub document_owner: Option<String>,
    /// Group applied when enforce rewrites the document.
    #[serde(default)]
    pub document_group: Option<String>,
    /// Octal permission bits applied when enforce rewrites the document.
    #[serde(default)]
    pub document_mode: Option<String>,
    /// Keyword introducing listener blocks.
    #[serde(default = "defaults::default_listener_keyword")]
    #[ortho_config(default = defaults::default_listener_keyword())]
    pub listener_keyword: String,
    /// Keyword whose first top-level occurrence starts the live suffix.
    #[serde(default = "defaults::default_live_boundary_keyword")]
    #[ortho_config(default = defaults::default_live_boundary_keyword())]
    pub live_boundary_keyword: String,
    /// TOML patch policy; the built-in policy applies when unset.
    #[serde(default)]
    pub policy_path: Option<Utf8PathBuf>,
    /// Filter expression for the tracing subscriber.
    #[serde(default = "defaults::default_log_filter_string")]
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log events.
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document_path: default_document_path(),
            state_dir: default_state_dir(),
            backup_dir: default_backup_dir(),
            freeze_dir: default_freeze_dir(),
            min_document_bytes: default_min_document_bytes(),
            backup_keep: default_backup_keep(),
            freeze_backup_max_age_secs: default_freeze_backup_max_age_secs(),
            restart_command: default_restart_command(),
            document_owner: None,
            document_group: None,
            document_mode: None,
            listener_keyword: default_listener_keyword(),
            live_boundary_keyword: default_live_boundary_keyword(),
            policy_path: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Path of the managed document.
    #[must_use]
    pub fn document_path(&self) -> &Utf8Path {
        &self.document_path
    }

    /// Directory holding the host lock and the applied fingerprint.
    #[must_use]
    pub fn state_dir(&self) -> &Utf8Path {
        &self.state_dir
    }

    /// Directory receiving transaction snapshots.
    #[must_use]
    pub fn backup_dir(&self) -> &Utf8Path {
        &self.backup_dir
    }

    /// Directory holding freeze state.
    #[must_use]
    pub fn freeze_dir(&self) -> &Utf8Path {
        &self.freeze_dir
    }

    /// Byte floor below which a document counts as truncated.
    #[must_use]
    pub const fn min_document_bytes(&self) -> usize {
        self.min_document_bytes
    }

    /// Number of transaction snapshots kept after pruning.
    #[must_use]
    pub const fn backup_keep(&self) -> usize {
        self.backup_keep
    }

    /// Maximum age of freeze snapshots.
    #[must_use]
    pub const fn freeze_backup_max_age(&self) -> Duration {
        Duration::from_secs(self.freeze_backup_max_age_secs)
    }

    /// Command that restarts the managed service.
    #[must_use]
    pub fn restart_command(&self) -> &str {
        &self.restart_command
    }

    /// Keyword introducing listener blocks.
    #[must_use]
    pub fn listener_keyword(&self) -> &str {
        &self.listener_keyword
    }

    /// Keyword marking the start of the live suffix.
    #[must_use]
    pub fn live_boundary_keyword(&self) -> &str {
        &self.live_boundary_keyword
    }

    /// Filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for log events.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Ownership and permissions applied when enforce rewrites the document.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when `document_mode` is not an octal number.
    pub fn document_identity(&self) -> Result<DocumentIdentity, IdentityError> {
        DocumentIdentity::new(
            self.document_owner.clone(),
            self.document_group.clone(),
            self.document_mode.as_deref(),
        )
    }

    /// Loads the patch policy named by `policy_path`, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] when the policy file cannot be read or parsed.
    pub fn patch_policy(&self) -> Result<PatchPolicy, PolicyError> {
        match &self.policy_path {
            Some(path) => PatchPolicy::load(path),
            None => Ok(PatchPolicy::default()),
        }
    }
}
