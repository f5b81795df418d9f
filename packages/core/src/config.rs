//! Store Configuration
//!
//! `StoreConfig` describes how the graph store opens its database. It can be
//! built in code, deserialized, or read from the environment:
//!
//! - `PROPGRAPH_DB_PATH`: database file (default `./propgraph.db`)
//! - `PROPGRAPH_BUSY_TIMEOUT_MS`: SQLite busy timeout (default 5000)
//! - `PROPGRAPH_WAL`: `0`/`false` disables Write-Ahead Logging

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound for the busy timeout; longer waits hide contention bugs
const MAX_BUSY_TIMEOUT_MS: u32 = 60_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the database file
    pub database_path: PathBuf,

    /// How long a connection waits on a locked database before failing
    pub busy_timeout_ms: u32,

    /// Enable Write-Ahead Logging for concurrent readers
    pub wal: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./propgraph.db"),
            busy_timeout_ms: 5000,
            wal: true,
        }
    }
}

impl StoreConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Build a config from `PROPGRAPH_*` environment variables, falling back to
    /// defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let database_path = lookup("PROPGRAPH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let busy_timeout_ms = lookup("PROPGRAPH_BUSY_TIMEOUT_MS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.busy_timeout_ms);
        let wal = lookup("PROPGRAPH_WAL")
            .map(|v| !matches!(v.as_str(), "0" | "false"))
            .unwrap_or(defaults.wal);

        Self {
            database_path,
            busy_timeout_ms,
            wal,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("database_path cannot be empty".to_string());
        }

        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(format!(
                "busy_timeout_ms cannot exceed {}",
                MAX_BUSY_TIMEOUT_MS
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.database_path, PathBuf::from("./propgraph.db"));
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.wal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PROPGRAPH_DB_PATH", "/tmp/graph.db"),
            ("PROPGRAPH_BUSY_TIMEOUT_MS", "250"),
            ("PROPGRAPH_WAL", "false"),
        ]);
        let config = StoreConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.database_path, PathBuf::from("/tmp/graph.db"));
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.wal);
    }

    #[test]
    fn test_unparsable_values_fall_back_to_defaults() {
        let config = StoreConfig::from_lookup(|k| match k {
            "PROPGRAPH_BUSY_TIMEOUT_MS" => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = StoreConfig::default();

        config.database_path = PathBuf::new();
        assert!(config.validate().is_err());

        config.database_path = PathBuf::from("graph.db");
        config.busy_timeout_ms = MAX_BUSY_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());
    }
}
