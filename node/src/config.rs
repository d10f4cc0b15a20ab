//! Service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vox_crypto::VoteKey;
use vox_types::Difficulty;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for a VoxLedger service.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Leading zero hex digits every block hash must carry.
    #[serde(default)]
    pub difficulty: Difficulty,

    /// Upper bound on one append (seal + persist), in milliseconds.
    #[serde(default = "default_append_timeout_ms")]
    pub append_timeout_ms: u64,

    /// Hex-encoded 256-bit vote encryption key. Required unless
    /// `ephemeral_key` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_key: Option<String>,

    /// Allow opening without `vote_key` by generating a throwaway key.
    /// Ballots sealed under it cannot be decrypted after a restart.
    #[serde(default)]
    pub ephemeral_key: bool,

    /// LMDB map size in MiB.
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    /// Sealing threads (0 = one per core).
    #[serde(default)]
    pub seal_threads: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./vox_data")
}

fn default_append_timeout_ms() -> u64 {
    30_000
}

fn default_map_size_mb() -> usize {
    256
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn append_timeout(&self) -> Duration {
        Duration::from_millis(self.append_timeout_ms)
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    /// The configured vote key, if any.
    pub fn vote_key(&self) -> Result<Option<VoteKey>, NodeError> {
        self.vote_key
            .as_deref()
            .map(VoteKey::from_hex)
            .transpose()
            .map_err(|e| NodeError::Config(format!("vote_key: {e}")))
    }

    /// The key ballots are sealed with: the configured one, or a fresh
    /// ephemeral key when `ephemeral_key` allows it.
    pub fn resolve_vote_key(&self) -> Result<VoteKey, NodeError> {
        match self.vote_key()? {
            Some(key) => Ok(key),
            None if self.ephemeral_key => {
                tracing::warn!(
                    "no vote_key configured, using an ephemeral key; ballots will not decrypt after restart"
                );
                Ok(VoteKey::generate()?)
            }
            None => Err(NodeError::Config(
                "vote_key is not set (set ephemeral_key = true to run with a throwaway key)".into(),
            )),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            difficulty: Difficulty::default(),
            append_timeout_ms: default_append_timeout_ms(),
            vote_key: None,
            ephemeral_key: false,
            map_size_mb: default_map_size_mb(),
            seal_threads: 0,
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
