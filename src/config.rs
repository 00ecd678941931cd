//! Node configuration
//!
//! Loaded from a TOML file, with `POOLSWAP_*` environment overrides.

use crate::error::{LedgerError, Result};
use crate::primitives::Amount;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory of the sled database
    pub data_dir: PathBuf,

    /// Page cache size handed to sled
    pub cache_capacity_bytes: u64,

    /// Default tracing filter directive (overridden by RUST_LOG)
    pub log_filter: String,

    /// Yield farming emission distributed to pools every block
    pub yield_farming_per_block: Amount,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/poolswap"),
            cache_capacity_bytes: 64 * 1024 * 1024,
            log_filter: "info".to_string(),
            yield_farming_per_block: 0,
        }
    }
}

impl Config {
    /// Load from a TOML file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| LedgerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Apply environment variable overrides
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(data_dir) = std::env::var("POOLSWAP_DATA_DIR") {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(filter) = std::env::var("POOLSWAP_LOG") {
            self.log_filter = filter;
        }

        if let Ok(value) = std::env::var("POOLSWAP_YIELD_FARMING") {
            self.yield_farming_per_block = value.parse().map_err(|e| {
                LedgerError::Config(format!("POOLSWAP_YIELD_FARMING: {}", e))
            })?;
        }

        Ok(self)
    }
}
