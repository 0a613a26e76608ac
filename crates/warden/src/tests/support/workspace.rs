//! Temporary host layouts for engine tests.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use warden_config::{Config, RuntimePaths};

use crate::backup::{BackupManager, BackupSnapshot, FREEZE_BACKUP_PREFIX, TRANSACTION_BACKUP_PREFIX};
use crate::fingerprint::Fingerprint;

/// A realistic server document, deliberately out of policy in several places.
pub const SERVER_CONFIG: &str = concat!(
    "serverName                web01\n",
    "user                      nobody\n",
    "group                     nogroup\n",
    "priority                  0\n",
    "autoRestart               0\n",
    "chrootPath                /\n",
    "enableChroot              0\n",
    "inMemBufSize              60M\n",
    "swappingDir               /tmp/lshttpd/swap\n",
    "showVersionNumber         1\n",
    "errorlog logs/error.log {\n",
    "  logLevel                DEBUG\n",
    "  debugLevel              0\n",
    "  rollingSize             10M\n",
    "}\n",
    "accesslog logs/access.log {\n",
    "  rollingSize             10M\n",
    "  keepDays                30\n",
    "  compressArchive         0\n",
    "}\n",
    "tuning  {\n",
    "  maxConnections          2000\n",
    "  maxSSLConnections       1000\n",
    "  connTimeout             300\n",
    "  maxKeepAliveReq         10000\n",
    "  totalInMemCacheSize     20M\n",
    "}\n",
    "listener Default {\n",
    "  address                 *:80\n",
    "  secure                  0\n",
    "}\n",
    "listener SSL {\n",
    "  address                 *:443\n",
    "  secure                  1\n",
    "  keyFile                 /etc/ssl/private/web01.key\n",
    "  certFile                /etc/ssl/certs/web01.crt\n",
    "  ciphers                 EECDH+AESGCM:EDH+AESGCM\n",
    "}\n",
    "module cache {\n",
    "  ls_enabled              1\n",
    "}\n",
    "virtualhost Example {\n",
    "  vhRoot                  /srv/example\n",
    "  configFile              conf/vhosts/example.conf\n",
    "  allowSymbolLink         1\n",
    "}\n",
    "virtualhost Shop {\n",
    "  vhRoot                  /srv/shop\n",
    "  configFile              conf/vhosts/shop.conf\n",
    "  allowSymbolLink         1\n",
    "}\n",
);

/// Line on which the first `virtualhost` block opens in [`SERVER_CONFIG`].
pub const SERVER_CONFIG_BOUNDARY: usize = 42;

/// A temporary host with its own document, state and backup directories.
pub struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
    config: Config,
}

impl Workspace {
    /// Creates a workspace whose document holds `text`.
    #[must_use]
    pub fn with_document(text: &str) -> Self {
        let workspace = Self::empty();
        workspace.write_document(text);
        workspace
    }

    /// Creates a workspace with no document on disk.
    #[must_use]
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 tempdir");
        let config = Config {
            document_path: root.join("conf/httpd_config.conf"),
            state_dir: root.join("state"),
            backup_dir: root.join("backups"),
            freeze_dir: root.join("state/freeze"),
            min_document_bytes: 64,
            restart_command: "true".to_owned(),
            ..Config::default()
        };
        fs::create_dir_all(root.join("conf")).expect("create conf dir");
        Self {
            _dir: dir,
            root,
            config,
        }
    }

    /// Root of the temporary tree.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Configuration pointing into the workspace.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable configuration for tests that tune retention or keywords.
    pub const fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Runtime paths derived from the configuration.
    #[must_use]
    pub fn paths(&self) -> RuntimePaths {
        RuntimePaths::from_config(&self.config)
    }

    /// Path of the managed document.
    #[must_use]
    pub fn document_path(&self) -> &Utf8Path {
        self.config.document_path()
    }

    /// Overwrites the managed document.
    pub fn write_document(&self, text: &str) {
        fs::write(self.document_path(), text).expect("write document");
    }

    /// Current content of the managed document.
    #[must_use]
    pub fn document(&self) -> String {
        fs::read_to_string(self.document_path()).expect("read document")
    }

    /// Fingerprint of the managed document as it is on disk.
    #[must_use]
    pub fn document_fingerprint(&self) -> Fingerprint {
        Fingerprint::of_file(self.document_path()).expect("fingerprint document")
    }

    /// Fingerprint recorded by the last successful transaction.
    #[must_use]
    pub fn applied_fingerprint(&self) -> Option<Fingerprint> {
        Fingerprint::load(&self.paths().applied_fingerprint_path()).expect("load fingerprint")
    }

    /// Snapshots taken by transactions, oldest first.
    #[must_use]
    pub fn transaction_backups(&self) -> Vec<BackupSnapshot> {
        BackupManager::new(self.config.backup_dir(), TRANSACTION_BACKUP_PREFIX)
            .list()
            .expect("list transaction backups")
    }

    /// Snapshots taken by freeze enforcement, oldest first.
    #[must_use]
    pub fn freeze_backups(&self) -> Vec<BackupSnapshot> {
        BackupManager::new(self.config.freeze_dir(), FREEZE_BACKUP_PREFIX)
            .list()
            .expect("list freeze backups")
    }

    /// Writes a lock file naming `pid` as holder.
    pub fn hold_lock(&self, pid: u32) {
        let paths = self.paths();
        paths.ensure_directories().expect("create runtime directories");
        fs::write(paths.lock_path(), format!("{pid}\n")).expect("write lock file");
    }
}
