//! Host configuration: the knobs an operator can set before the Supervisor
//! starts, as opposed to `HostSettings`, which is mutated at runtime through
//! the paired controlling UI and lives in `mediabus_core::types`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_PORT: u16 = 8443;
const DEFAULT_HOSTNAME: &str = "mediabus.local";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Static host configuration, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub hostname: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            port: DEFAULT_PORT,
            database_path: PathBuf::from("mediabus.db"),
            log_filter: "info".to_string(),
        }
    }
}

impl HostConfig {
    /// Layers environment variables over the defaults: `MEDIABUS_HOSTNAME`,
    /// `MEDIABUS_PORT`, `MEDIABUS_DB_PATH`, `MEDIABUS_LOG`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(hostname) = std::env::var("MEDIABUS_HOSTNAME") {
            config.hostname = hostname;
        }
        if let Ok(port) = std::env::var("MEDIABUS_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(path) = std::env::var("MEDIABUS_DB_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(filter) = std::env::var("MEDIABUS_LOG") {
            config.log_filter = filter;
        }
        config
    }

    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.is_empty() {
            return Err(ConfigError::Invalid("hostname must not be empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be nonzero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(HostConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_hostname_is_rejected() {
        let mut config = HostConfig::default();
        config.hostname.clear();
        assert!(config.validate().is_err());
    }
}
