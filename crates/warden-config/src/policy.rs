//! Directive values written by the patch stages.
//!
//! A [`PatchPolicy`] is plain data: which top-level directives to pin, which
//! logging blocks to adjust, how tuning scales with available memory, which
//! overrides depend on kernel features and what TLS settings secure
//! listeners carry. The engine decides where each value lands; the policy
//! only says what the values are.

use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directive values applied by the four patch stages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PatchPolicy {
    /// Top-level directives pinned on every run.
    #[serde(default)]
    pub top_level: BTreeMap<String, String>,
    /// Logging blocks and the directives set inside each.
    #[serde(default)]
    pub logging: Vec<LoggingBlock>,
    /// Keyword of the block receiving tuning directives.
    #[serde(default = "default_tuning_block")]
    pub tuning_block: String,
    /// Memory tiers, selected by available RAM.
    #[serde(default)]
    pub tiers: Vec<TuningTier>,
    /// Tuning directives applied only when a kernel feature is present.
    #[serde(default)]
    pub feature_overrides: Vec<FeatureOverride>,
    /// Settings applied to listeners carrying the secure attribute.
    #[serde(default)]
    pub tls: TlsPolicy,
}

/// A logging block addressed by keyword and optional secondary token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingBlock {
    /// Block keyword, e.g. `errorlog`.
    pub keyword: String,
    /// Optional second header token narrowing the match.
    #[serde(default)]
    pub token: Option<String>,
    /// Directives set inside the block.
    #[serde(default)]
    pub directives: BTreeMap<String, String>,
}

/// Directive values for hosts with at least `min_memory_gb` of RAM.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TuningTier {
    /// Lower memory bound of the tier, in whole gigabytes.
    pub min_memory_gb: u64,
    /// Top-level directives scaled with the tier (e.g. worker count).
    #[serde(default)]
    pub top_level: BTreeMap<String, String>,
    /// Directives set inside the tuning block.
    #[serde(default)]
    pub tuning: BTreeMap<String, String>,
}

/// A tuning directive gated on a kernel feature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureOverride {
    /// Feature name checked against the host resources.
    pub feature: String,
    /// Tuning directive key.
    pub key: String,
    /// Value written when the feature is available.
    pub value: String,
}

/// TLS settings for listeners selected by an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsPolicy {
    /// Attribute key marking a secure listener.
    pub attribute_key: String,
    /// Attribute value marking a secure listener.
    pub attribute_value: String,
    /// Directives upserted in every secure listener.
    pub set: BTreeMap<String, String>,
    /// Directives removed from every secure listener.
    pub strip: Vec<String>,
}

impl Default for TlsPolicy {
    fn default() -> Self {
        Self {
            attribute_key: "secure".to_owned(),
            attribute_value: "1".to_owned(),
            set: BTreeMap::new(),
            strip: Vec::new(),
        }
    }
}

fn default_tuning_block() -> String {
    "tuning".to_owned()
}

fn pairs(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn tier(min_memory_gb: u64, workers: &str, tuning: &[(&str, &str)]) -> TuningTier {
    TuningTier {
        min_memory_gb,
        top_level: pairs(&[("httpdWorkers", workers)]),
        tuning: pairs(tuning),
    }
}

impl Default for PatchPolicy {
    fn default() -> Self {
        Self {
            top_level: pairs(&[
                ("autoRestart", "1"),
                ("gracefulRestartTimeout", "300"),
                ("showVersionNumber", "0"),
            ]),
            logging: vec![
                LoggingBlock {
                    keyword: "errorlog".to_owned(),
                    token: None,
                    directives: pairs(&[
                        ("debugLevel", "0"),
                        ("keepDays", "30"),
                        ("logLevel", "WARN"),
                        ("rollingSize", "10M"),
                    ]),
                },
                LoggingBlock {
                    keyword: "accesslog".to_owned(),
                    token: None,
                    directives: pairs(&[
                        ("compressArchive", "1"),
                        ("keepDays", "30"),
                        ("rollingSize", "10M"),
                    ]),
                },
            ],
            tuning_block: default_tuning_block(),
            tiers: vec![
                tier(
                    0,
                    "1",
                    &[
                        ("maxConnections", "2000"),
                        ("maxSSLConnections", "1000"),
                        ("totalInMemCacheSize", "20M"),
                    ],
                ),
                tier(
                    2,
                    "2",
                    &[
                        ("maxConnections", "10000"),
                        ("maxSSLConnections", "5000"),
                        ("totalInMemCacheSize", "64M"),
                    ],
                ),
                tier(
                    4,
                    "4",
                    &[
                        ("maxConnections", "20000"),
                        ("maxSSLConnections", "10000"),
                        ("totalInMemCacheSize", "128M"),
                    ],
                ),
                tier(
                    8,
                    "8",
                    &[
                        ("maxConnections", "40000"),
                        ("maxSSLConnections", "20000"),
                        ("totalInMemCacheSize", "256M"),
                    ],
                ),
            ],
            feature_overrides: Vec::new(),
            tls: TlsPolicy {
                set: pairs(&[
                    ("enableStapling", "1"),
                    ("renegProtection", "1"),
                    ("sslProtocol", "24"),
                ]),
                strip: vec!["ciphers".to_owned()],
                ..TlsPolicy::default()
            },
        }
    }
}

impl PatchPolicy {
    /// Reads and parses a TOML policy file.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Read`] when the file cannot be read and
    /// [`PolicyError::Parse`] when it is not a valid policy.
    pub fn load(path: &Utf8Path) -> Result<Self, PolicyError> {
        let text = fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| PolicyError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Parses a policy from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML deserialisation error when the text is not a policy.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Selects the highest tier whose memory bound does not exceed
    /// `memory_gb`.
    #[must_use]
    pub fn tier_for(&self, memory_gb: u64) -> Option<&TuningTier> {
        self.tiers
            .iter()
            .filter(|tier| tier.min_memory_gb <= memory_gb)
            .max_by_key(|tier| tier.min_memory_gb)
    }
}

/// Errors raised while loading a policy file.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("failed to read patch policy '{path}': {source}")]
    Read {
        /// Policy file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The policy file was not valid TOML or had unexpected fields.
    #[error("failed to parse patch policy '{path}': {source}")]
    Parse {
        /// Policy file path.
        path: Utf8PathBuf,
        /// Underlying TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },
}
