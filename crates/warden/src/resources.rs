//! Host resource discovery feeding tier and feature selection.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

const KIB_PER_GIB: u64 = 1024 * 1024;

/// Reports the host resources that scale tuning directives.
pub trait HostResources {
    /// Installed memory rounded to the nearest whole gigabyte.
    fn available_memory_gb(&self) -> u64;

    /// Whether the named kernel feature is usable on this host.
    fn feature_available(&self, name: &str) -> bool;
}

/// Host resources read from `/proc` and `/sys`.
///
/// A feature is available when `/proc/sys/kernel/<name>_disabled` reads `0`,
/// or, when no such switch exists, when `/sys/module/<name>` is present.
#[derive(Debug, Clone)]
pub struct SystemHostResources {
    proc_root: Utf8PathBuf,
    sys_root: Utf8PathBuf,
}

impl Default for SystemHostResources {
    fn default() -> Self {
        Self::with_roots("/proc", "/sys")
    }
}

impl SystemHostResources {
    /// Reads from alternative `/proc` and `/sys` roots.
    pub fn with_roots(proc_root: impl Into<Utf8PathBuf>, sys_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    fn meminfo_path(&self) -> Utf8PathBuf {
        self.proc_root.join("meminfo")
    }
}

impl HostResources for SystemHostResources {
    fn available_memory_gb(&self) -> u64 {
        let path = self.meminfo_path();
        let total = fs::read_to_string(&path)
            .ok()
            .and_then(|text| mem_total_kib(&text));
        match total {
            Some(kib) => kib.saturating_add(KIB_PER_GIB / 2) / KIB_PER_GIB,
            None => {
                debug!(target: "warden::resources", file = %path, "MemTotal unavailable");
                0
            }
        }
    }

    fn feature_available(&self, name: &str) -> bool {
        let switch = self
            .proc_root
            .join("sys/kernel")
            .join(format!("{name}_disabled"));
        match read_trimmed(&switch) {
            Some(value) => value == "0",
            None => self.sys_root.join("module").join(name).exists(),
        }
    }
}

fn read_trimmed(path: &Utf8Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|text| text.trim().to_owned())
}

fn mem_total_kib(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}
