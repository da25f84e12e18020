//! Configuration for the click feature store.

use crate::core::{EmptyKeyPolicy, OrderingPolicy, SlidingWindowStore, StoreOptions};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Default trailing window: 30 days.
pub const DEFAULT_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

/// Main configuration for a feature store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Trailing window over which events are counted
    #[serde(rename = "window_secs", with = "duration_serde")]
    pub window: Duration,

    /// Handling of records that arrive earlier than their key's latest
    #[serde(default)]
    pub ordering: OrderingPolicy,

    /// Handling of keys whose logs have been fully evicted
    #[serde(default)]
    pub empty_keys: EmptyKeyPolicy,

    /// Directory shard count override
    #[serde(default)]
    pub shard_amount: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window: Duration::seconds(DEFAULT_WINDOW_SECS),
            ordering: OrderingPolicy::default(),
            empty_keys: EmptyKeyPolicy::default(),
            shard_amount: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does
    /// not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("click-feature-store")
            .join("config.json")
    }

    /// Check values that deserialize fine but cannot build a store.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window <= Duration::zero() {
            return Err(ConfigError::Invalid(format!(
                "window_secs must be positive, got {}",
                self.window.num_seconds()
            )));
        }
        if let Some(shards) = self.shard_amount {
            if shards <= 1 || !shards.is_power_of_two() {
                return Err(ConfigError::Invalid(format!(
                    "shard_amount must be a power of two greater than one, got {shards}"
                )));
            }
        }
        Ok(())
    }

    /// Store options described by this configuration.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            ordering: self.ordering,
            empty_keys: self.empty_keys,
            shard_amount: self.shard_amount,
        }
    }

    /// Build an empty store from this configuration.
    pub fn build_store<K>(&self) -> Result<SlidingWindowStore<K>, ConfigError>
    where
        K: Eq + Hash + Clone,
    {
        SlidingWindowStore::with_options(self.window, self.store_options())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
mod duration_serde {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = i64::deserialize(deserializer)?;
        Duration::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom(format!("window_secs out of range: {secs}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window, Duration::days(30));
        assert_eq!(config.ordering, OrderingPolicy::Reorder);
        assert_eq!(config.empty_keys, EmptyKeyPolicy::Retain);
        assert!(config.shard_amount.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_json() {
        let config: Config = serde_json::from_str(r#"{"window_secs": 3600}"#).unwrap();
        assert_eq!(config.window, Duration::hours(1));
        assert_eq!(config.ordering, OrderingPolicy::Reorder);
    }

    #[test]
    fn test_parse_policies() {
        let config: Config = serde_json::from_str(
            r#"{"window_secs": 60, "ordering": "reject", "empty_keys": "reclaim", "shard_amount": 16}"#,
        )
        .unwrap();
        assert_eq!(config.ordering, OrderingPolicy::Reject);
        assert_eq!(config.empty_keys, EmptyKeyPolicy::Reclaim);
        assert_eq!(config.store_options().shard_amount, Some(16));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let config = Config {
            window: Duration::zero(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(config.build_store::<String>().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            window: Duration::days(7),
            ordering: OrderingPolicy::Reject,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"window_secs": -5}"#).unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
