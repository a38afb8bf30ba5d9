//! Host configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via LOGHOST_CONFIG or --config)
//! 3. Environment variables
//!
//! Command-line flags are applied on top by the binary. An environment value
//! that does not parse is an error, the same as a bad value in the file.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Wire protocol limits.
    pub protocol: ProtocolConfig,
    /// Append handler configuration.
    pub append: AppendConfig,
}

impl Config {
    /// Loads configuration from `path` (or defaults when `None`), then applies
    /// environment variable overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::ParseError(_, msg) => ConfigError::ParseError(path.to_path_buf(), msg),
            other => other,
        })
    }

    /// Parses configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(PathBuf::from("<inline>"), e.to_string()))
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.logging.apply_env_overrides();
        self.protocol.apply_env_overrides()?;
        self.append.apply_env_overrides()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.append.validate()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `warn` or `loghost_host=debug`.
    pub level: String,
    /// Log to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn apply_env_overrides(&mut self) {
        if let Some(level) = env_value("LOGHOST_LOG") {
            self.level = level;
        }

        if let Some(file) = std::env::var_os("LOGHOST_LOG_FILE") {
            if !file.is_empty() {
                self.file = Some(PathBuf::from(file));
            }
        }
    }
}

/// Wire protocol configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Largest accepted request payload in bytes (0 = no limit).
    pub max_request_bytes: u32,
}

impl ProtocolConfig {
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(max) = env_value("LOGHOST_MAX_REQUEST_BYTES") {
            self.max_request_bytes = max.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "LOGHOST_MAX_REQUEST_BYTES must be a byte count, got '{}'",
                    max
                ))
            })?;
        }
        Ok(())
    }

    /// Returns the payload limit to enforce on incoming frames.
    pub fn max_payload(&self) -> u32 {
        if self.max_request_bytes == 0 {
            loghost_protocol::MAX_PAYLOAD_SIZE
        } else {
            self.max_request_bytes
        }
    }
}

/// How hard the handler pushes appended data toward the disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Flush the writer before answering.
    #[default]
    Flush,
    /// Flush, then fsync the file data before answering.
    Fsync,
}

/// Append handler configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppendConfig {
    /// Sync policy applied after every append.
    pub sync: SyncPolicy,
    /// Directories appends are restricted to (empty = anywhere).
    pub allowed_dirs: Vec<PathBuf>,
}

impl AppendConfig {
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(policy) = env_value("LOGHOST_SYNC") {
            self.sync = match policy.trim().to_lowercase().as_str() {
                "flush" => SyncPolicy::Flush,
                "fsync" => SyncPolicy::Fsync,
                _ => {
                    return Err(ConfigError::ValidationError(format!(
                        "LOGHOST_SYNC must be 'flush' or 'fsync', got '{}'",
                        policy
                    )))
                }
            };
        }

        if let Some(dirs) = std::env::var_os("LOGHOST_ALLOWED_DIRS") {
            self.allowed_dirs = std::env::split_paths(&dirs)
                .filter(|dir| !dir.as_os_str().is_empty())
                .collect();
        }
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for dir in &self.allowed_dirs {
            if !dir.is_absolute() {
                return Err(ConfigError::ValidationError(format!(
                    "allowed_dirs entry '{}' must be an absolute path",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Returns whether appending to `path` is permitted.
    ///
    /// With no allowed directories configured every path is permitted.
    /// Otherwise the path must be absolute, free of `..` components and
    /// located under one of the allowed directories.
    pub fn permits(&self, path: &Path) -> bool {
        if self.allowed_dirs.is_empty() {
            return true;
        }
        if !path.is_absolute() || path.components().any(|c| c == Component::ParentDir) {
            return false;
        }
        self.allowed_dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// Reads a non-empty environment variable.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
