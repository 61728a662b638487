//! Broker configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults;

/// Errors raised while loading a [`BrokerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration is not valid JSON or has unknown fields.
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    /// The storage partition cannot be used as a key prefix.
    #[error("invalid partition {partition:?}: {reason}")]
    InvalidPartition {
        /// The rejected partition.
        partition: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Tunables of a [`StorageBroker`](crate::StorageBroker).
///
/// ```json
/// { "remember_denials": true, "partition": "cross-origin-storage", "verify_writes": false }
/// ```
///
/// Every field is optional; missing fields take the values in
/// [`defaults`](crate::defaults).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Remember `deny` answers so the same origin is not asked again for the
    /// same hash. When `false`, every request after a denial prompts again.
    pub remember_denials: bool,
    /// Storage partition that prefixes every entry key.
    pub partition: String,
    /// Re-hash written bytes and reject them if they do not match the
    /// handle's hash.
    pub verify_writes: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            remember_denials: defaults::REMEMBER_DENIALS,
            partition: defaults::STORAGE_PARTITION.to_string(),
            verify_writes: defaults::VERIFY_WRITES,
        }
    }
}

impl BrokerConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, has unknown fields, or
    /// fails [`BrokerConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the partition is a single, non-empty key segment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPartition`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason| ConfigError::InvalidPartition {
            partition: self.partition.clone(),
            reason,
        };
        if self.partition.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if self.partition.contains('/') {
            return Err(invalid("must not contain '/'"));
        }
        if self.partition.starts_with('.') {
            return Err(invalid("must not start with '.'"));
        }
        if self
            .partition
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '\\')
        {
            return Err(invalid("must not contain whitespace, control characters or '\\'"));
        }
        Ok(())
    }

    /// Sets [`BrokerConfig::remember_denials`].
    #[must_use]
    pub const fn with_remember_denials(mut self, remember_denials: bool) -> Self {
        self.remember_denials = remember_denials;
        self
    }

    /// Sets [`BrokerConfig::verify_writes`].
    #[must_use]
    pub const fn with_verify_writes(mut self, verify_writes: bool) -> Self {
        self.verify_writes = verify_writes;
        self
    }
}
