use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default location of the managed server configuration document.
pub const DEFAULT_DOCUMENT_PATH: &str = "/usr/local/lsws/conf/httpd_config.conf";

/// Default directory holding the lock and applied fingerprint.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/warden";

/// Default directory holding transaction snapshots.
pub const DEFAULT_BACKUP_DIR: &str = "/var/backups/warden";

/// Default directory holding the freeze marker, prefix and fingerprint.
pub const DEFAULT_FREEZE_DIR: &str = "/var/lib/warden/freeze";

/// Documents smaller than this are treated as truncated.
pub const DEFAULT_MIN_DOCUMENT_BYTES: usize = 512;

/// Number of transaction snapshots retained after a commit.
pub const DEFAULT_BACKUP_KEEP: usize = 10;

/// Maximum age of freeze-related snapshots, in seconds (thirty days).
pub const DEFAULT_FREEZE_BACKUP_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

/// Command used to restart the server after a committed change.
pub const DEFAULT_RESTART_COMMAND: &str = "systemctl restart lsws";

/// Keyword introducing listener blocks.
pub const DEFAULT_LISTENER_KEYWORD: &str = "listener";

/// Keyword whose first top-level occurrence starts the live suffix.
pub const DEFAULT_LIVE_BOUNDARY_KEYWORD: &str = "virtualhost";

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default document path as an owned value.
pub fn default_document_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_DOCUMENT_PATH)
}

/// Default state directory as an owned value.
pub fn default_state_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_STATE_DIR)
}

/// Default backup directory as an owned value.
pub fn default_backup_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_BACKUP_DIR)
}

/// Default freeze directory as an owned value.
pub fn default_freeze_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_FREEZE_DIR)
}

/// Default minimum document size.
pub const fn default_min_document_bytes() -> usize {
    DEFAULT_MIN_DOCUMENT_BYTES
}

/// Default transaction snapshot retention count.
pub const fn default_backup_keep() -> usize {
    DEFAULT_BACKUP_KEEP
}

/// Default freeze snapshot maximum age.
pub const fn default_freeze_backup_max_age_secs() -> u64 {
    DEFAULT_FREEZE_BACKUP_MAX_AGE_SECS
}

/// Owned restart command used where allocation is required (e.g. serde).
pub fn default_restart_command() -> String {
    DEFAULT_RESTART_COMMAND.to_owned()
}

/// Owned listener keyword.
pub fn default_listener_keyword() -> String {
    DEFAULT_LISTENER_KEYWORD.to_owned()
}

/// Owned live boundary keyword.
pub fn default_live_boundary_keyword() -> String {
    DEFAULT_LIVE_BOUNDARY_KEYWORD.to_owned()
}

/// Default log filter expression used by the binary.
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
