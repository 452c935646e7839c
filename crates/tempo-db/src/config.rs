use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempo_lock::LockConfig;

use crate::error::{DbError, DbResult};

/// Configuration for one database connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Validity window for cached derived properties.
    pub cache_ttl: Duration,
    /// Re-run the validator before every commit. Intended for debug and
    /// test deployments; load-time validation always runs.
    pub validate_on_commit: bool,
    /// Lock acquisition bounds.
    pub lock: LockConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30),
            validate_on_commit: false,
            lock: LockConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> DbResult<Self> {
        toml::from_str(text).map_err(|e| DbError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = DatabaseConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert!(!config.validate_on_commit);
    }

    #[test]
    fn toml_roundtrip() {
        let config = DatabaseConfig {
            validate_on_commit: true,
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        let parsed = DatabaseConfig::from_toml_str(&text).unwrap();
        assert!(parsed.validate_on_commit);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed = DatabaseConfig::from_toml_str("validate_on_commit = true\n").unwrap();
        assert!(parsed.validate_on_commit);
        assert_eq!(parsed.cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = DatabaseConfig::from_toml_str("validate_on_commit = maybe").unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }
}
