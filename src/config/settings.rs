//! Configuration settings for the sockbridge relay.

use serde::Deserialize;
use std::path::Path;

use crate::error::RelayError;

/// Main configuration structure for the relay.
///
/// The socket path itself is not configuration; it is always the
/// positional command line argument.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Size of the bounded per-request read from the client, also used to
    /// chunk the backend reply. A request larger than this is truncated to
    /// its first chunk.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Socket file permissions (e.g., "0666").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_buffer_size() -> usize {
    1024
}

fn default_socket_permissions() -> String {
    "0666".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            permissions: default_socket_permissions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| RelayError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings: Settings = toml::from_str(&content).map_err(|e| RelayError::Config {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.relay.buffer_size == 0 {
            return Err(RelayError::Config {
                message: "relay.buffer_size must be greater than zero".to_string(),
            });
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(RelayError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(RelayError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        // Validate socket permissions format
        if !self.socket.permissions.chars().all(|c| c.is_ascii_digit()) {
            return Err(RelayError::Config {
                message: format!(
                    "Invalid socket permissions '{}'. Must be octal (e.g., '0666')",
                    self.socket.permissions
                ),
            });
        }

        Ok(())
    }
}
