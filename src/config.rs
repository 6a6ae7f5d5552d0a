//! Kernel configuration, loaded from a TOML file with sane defaults.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Directory holding the kernel database. Created on first boot.
    pub workspace_dir: PathBuf,
    pub oracle: OracleConfig,
    pub cache: CacheConfig,
    pub events: EventConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// When false the planner skips the oracle entirely and uses the
    /// deterministic keyword router.
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub history_limit: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from("workspace"),
            oracle: OracleConfig::default(),
            cache: CacheConfig::default(),
            events: EventConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_secs: 20,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self { history_limit: 1000 }
    }
}

impl KernelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Load from `path` if it exists and parses; otherwise fall back to
    /// defaults so the kernel can always boot.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Config load failed ({e}), using defaults");
                Self::default()
            }
        }
    }
}
