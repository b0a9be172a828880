//! Loading and validating the top-level configuration

use crate::components::{AuthConfig, LlmConfig, ServerConfig, SyncConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable overriding `server.host`
pub const HOST_ENV: &str = "ARBOR_HOST";

/// Environment variable overriding `server.port`
pub const PORT_ENV: &str = "ARBOR_PORT";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value is present but unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArborConfig {
    /// Listener settings
    pub server: ServerConfig,
    /// Replicated document settings
    pub sync: SyncConfig,
    /// Upstream completion provider
    pub llm: LlmConfig,
    /// Identity and capability settings
    pub auth: AuthConfig,
}

impl ArborConfig {
    /// Load configuration from `path`, or defaults when no path is given,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without applying overrides
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: ArborConfig = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply `ARBOR_HOST` / `ARBOR_PORT` using the given variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a port: {port}")))?;
        }
        Ok(())
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.sync.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid(
                "sync.broadcast_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
