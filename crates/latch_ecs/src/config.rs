//! Storage configuration
//!
//! Tunables for the entity storage engine, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};
use thiserror::Error;

/// Upper bound on rows per allocation; row indices are stored as `u32` and
/// larger chunks stop fitting in cache anyway.
pub const MAX_ALLOCATION_CAPACITY: u32 = 1 << 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read storage config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse storage config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid storage config: {reason}")]
    Invalid { reason: String },
}

/// Tunables shared by every archetype of an `EntityManager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Number of rows in every allocation (chunk).
    pub allocation_capacity: u32,
    /// Entity location slots reserved up front.
    pub initial_entity_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            allocation_capacity: 128,
            initial_entity_capacity: 1024,
        }
    }
}

impl StorageConfig {
    /// Parse and validate a config from a JSON document. Missing fields
    /// take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allocation_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "allocation_capacity must be at least 1".to_string(),
            });
        }
        if self.allocation_capacity > MAX_ALLOCATION_CAPACITY {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "allocation_capacity {} exceeds the maximum of {}",
                    self.allocation_capacity, MAX_ALLOCATION_CAPACITY
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = StorageConfig::from_json_str(r#"{ "allocation_capacity": 16 }"#).unwrap();
        assert_eq!(config.allocation_capacity, 16);
        assert_eq!(config.initial_entity_capacity, 1024);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = StorageConfig::from_json_str(r#"{ "allocation_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = StorageConfig::from_json_str("{ allocation_capacity: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = StorageConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
