//! Configuration file management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use evinfo_core::tcp::{DEFAULT_ADAPTER_ADDRESS, DEFAULT_CONNECT_TIMEOUT};
use evinfo_core::{SessionConfig, ValidationError};

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Adapter connection settings.
    pub adapter: AdapterConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Polling session timing.
    pub session: SessionConfig,
}

impl Config {
    /// Load configuration from the default path, or defaults if it is absent.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Adapter address is in `host:port` form with a non-zero port
    /// - Storage path is not empty
    /// - Session timing is within bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.adapter.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.session.validate("session"));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Adapter connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Adapter address as `host:port`.
    pub address: String,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADAPTER_ADDRESS.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl AdapterConfig {
    /// Validate adapter configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match self.address.rsplit_once(':') {
            None => errors.push(ValidationError {
                field: "adapter.address".to_string(),
                message: format!(
                    "invalid address '{}': expected format 'host:port'",
                    self.address
                ),
            }),
            Some((host, _)) if host.is_empty() => errors.push(ValidationError {
                field: "adapter.address".to_string(),
                message: "host cannot be empty".to_string(),
            }),
            Some((_, port)) => match port.parse::<u16>() {
                Ok(0) => errors.push(ValidationError {
                    field: "adapter.address".to_string(),
                    message: "port cannot be 0".to_string(),
                }),
                Err(_) => errors.push(ValidationError {
                    field: "adapter.address".to_string(),
                    message: format!("invalid port '{port}': must be a number 1-65535"),
                }),
                Ok(_) => {}
            },
        }

        if self.connect_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "adapter.connect_timeout_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: evinfo_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
///
/// - Linux: `~/.config/evinfo/config.toml`
/// - macOS: `~/Library/Application Support/evinfo/config.toml`
/// - Windows: `C:\Users\<user>\AppData\Roaming\evinfo\config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("evinfo")
        .join("config.toml")
}
