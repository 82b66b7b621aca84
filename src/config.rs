//! Engine configuration.
//!
//! Replaces process-wide defaults with an explicit value handed to the engine
//! at construction. Deserializable so hosts can load it from their own config.

use serde::Deserialize;

use credvault_crypto::{AES_KEY_LENGTH, DEFAULT_DATA_KEY_SIZE};

use crate::error::{Result, SecretError};

/// Table used when none is configured.
pub const DEFAULT_TABLE: &str = "credential-store";

/// Key management alias used to mint data keys when none is configured.
pub const DEFAULT_KEY_ALIAS: &str = "alias/credstash";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Backing table holding one item per (name, version).
    pub table: String,
    /// Wrapping key alias passed to the key management service on writes.
    pub key_alias: String,
    /// Bytes of key material minted per write; first 32 are the cipher key.
    pub data_key_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            key_alias: DEFAULT_KEY_ALIAS.to_string(),
            data_key_size: DEFAULT_DATA_KEY_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_key_alias(mut self, alias: impl Into<String>) -> Self {
        self.key_alias = alias.into();
        self
    }

    pub fn with_data_key_size(mut self, size: usize) -> Self {
        self.data_key_size = size;
        self
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| SecretError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.table.is_empty() {
            return Err(SecretError::InvalidConfig("table must not be empty".into()));
        }
        if self.key_alias.is_empty() {
            return Err(SecretError::InvalidConfig(
                "key_alias must not be empty".into(),
            ));
        }
        if self.data_key_size <= AES_KEY_LENGTH {
            return Err(SecretError::InvalidConfig(format!(
                "data_key_size must exceed {} bytes to leave room for the MAC key, got {}",
                AES_KEY_LENGTH, self.data_key_size
            )));
        }
        Ok(())
    }
}
