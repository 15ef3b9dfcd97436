//! Configuration management

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ChainConfig {
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChainSection {
    #[serde(default = "default_native_token")]
    pub native_token: String,
    /// When false, transactions are neither fee-checked nor charged.
    #[serde(default = "default_fees_enabled")]
    pub fees_enabled: bool,
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MinerConfig {
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Optional cap on hashes per block; unset means search until found.
    #[serde(default)]
    pub max_attempts: Option<u64>,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            native_token: default_native_token(),
            fees_enabled: default_fees_enabled(),
            difficulty: default_difficulty(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            max_attempts: None,
        }
    }
}

impl ChainSection {
    /// The fee token handed to [`crate::blockchain::ChainState`].
    pub fn fee_token(&self) -> Option<String> {
        self.fees_enabled.then(|| self.native_token.clone())
    }
}

impl ChainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.miner.threads == 0 {
            return Err(ChainError::Config(
                "miner.threads must be at least 1".to_string(),
            ));
        }

        if self.chain.fees_enabled && self.chain.native_token.trim().is_empty() {
            return Err(ChainError::Config(
                "chain.native_token must not be empty while fees are enabled".to_string(),
            ));
        }

        Ok(())
    }
}

/// Loads `path`, falling back to defaults when the file is missing or empty.
pub fn load_config(path: impl AsRef<Path>) -> Result<ChainConfig> {
    let config_str = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let config: ChainConfig = if config_str.trim().is_empty() {
        ChainConfig::default()
    } else {
        toml::from_str(&config_str)?
    };

    config.validate()?;
    Ok(config)
}

fn default_native_token() -> String {
    "SOUL".to_string()
}

fn default_fees_enabled() -> bool {
    true
}

/// Hash must fall below 2^241: roughly one SHA-256 header in 32k qualifies.
fn default_difficulty() -> u32 {
    240
}

fn default_threads() -> usize {
    1
}
