//! Index configuration module.
//!
//! This module provides configuration loading for the index from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `KEYINDEX_PATH`: Path of the index file (default: `./IntIndex.idx`)
//! - `KEYINDEX_SYNC_WRITES`: Whether every record write is followed by a
//!   data sync, one of `true`, `false`, `1`, `0` (default: `true`)

use std::path::PathBuf;

/// Index configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Path of the index file. Created empty if it does not exist.
    pub path: PathBuf,
    /// Sync file data after every record write.
    pub sync_writes: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(Self::DEFAULT_PATH),
            sync_writes: Self::DEFAULT_SYNC_WRITES,
        }
    }
}

impl IndexConfig {
    /// Default index file path.
    pub const DEFAULT_PATH: &'static str = "./IntIndex.idx";
    /// Sync after every write unless told otherwise.
    pub const DEFAULT_SYNC_WRITES: bool = true;

    /// Configuration for the index file at `path`, other settings default.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `KEYINDEX_SYNC_WRITES` is set but not a
    /// recognized boolean.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = Self::load_path();
        let sync_writes = Self::load_sync_writes()?;

        Ok(Self { path, sync_writes })
    }

    /// Load the index path from environment.
    ///
    /// Returns the default if not set.
    fn load_path() -> PathBuf {
        std::env::var("KEYINDEX_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_PATH))
    }

    /// Load the sync flag from environment.
    ///
    /// Returns the default if not set.
    fn load_sync_writes() -> Result<bool, ConfigError> {
        match std::env::var("KEYINDEX_SYNC_WRITES") {
            Ok(value) => parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                name: "KEYINDEX_SYNC_WRITES".to_string(),
                message: format!("'{value}' is not a boolean (expected true, false, 1 or 0)"),
            }),
            Err(_) => Ok(Self::DEFAULT_SYNC_WRITES),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = IndexConfig::default();
        assert_eq!(config.path, PathBuf::from("./IntIndex.idx"));
        assert!(config.sync_writes);
    }

    #[test]
    fn test_with_path_keeps_defaults() {
        let config = IndexConfig::with_path("/tmp/other.idx");
        assert_eq!(config.path, PathBuf::from("/tmp/other.idx"));
        assert_eq!(config.sync_writes, IndexConfig::DEFAULT_SYNC_WRITES);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool(" FALSE "), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_config_error_display_invalid() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }
}
