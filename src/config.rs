//! # Configuration Management
//!
//! Centralized configuration for the interception core.
//!
//! This module provides structured configuration for the pipeline, the
//! accessor compiler, and logging, including queue limits, deferral
//! timeouts, and fast-path compilation behavior.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Operational Considerations
//! - The deferral timeout bounds how long one stuck listener can block a
//!   connection's queue
//! - The per-channel pending limit is the backstop against a queue growing
//!   without bound behind a parked message

use crate::error::{InterceptError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct InterceptConfig {
    /// Pipeline-specific configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Accessor/compiler configuration
    #[serde(default)]
    pub accessor: AccessorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl InterceptConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Start with defaults
        let mut config = Self::default();

        // Override with environment variables
        if let Ok(limit) = std::env::var("PACKET_INTERCEPT_MAX_PENDING") {
            if let Ok(val) = limit.parse::<usize>() {
                config.pipeline.max_pending_per_channel = val;
            }
        }

        if let Ok(timeout) = std::env::var("PACKET_INTERCEPT_DEFERRAL_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.pipeline.deferral_timeout = Duration::from_millis(val);
                config.pipeline.enforce_deferral_timeout = true;
            }
        }

        if let Ok(background) = std::env::var("PACKET_INTERCEPT_BACKGROUND_COMPILE") {
            if let Ok(val) = background.parse::<bool>() {
                config.accessor.background_compile = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.pipeline.validate());
        errors.extend(self.accessor.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(InterceptError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Pipeline-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Maximum number of undelivered messages per (connection, direction)
    /// queue before submissions are rejected
    pub max_pending_per_channel: usize,

    /// Whether deferred messages are forcibly cancelled after a deadline
    pub enforce_deferral_timeout: bool,

    /// How long a deferred message may stay parked before it is treated as
    /// cancelled
    #[serde(with = "duration_serde")]
    pub deferral_timeout: Duration,

    /// Whether a stale type registry is rebuilt automatically on the next
    /// intercepted message
    pub auto_rebuild: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pending_per_channel: 1024,
            enforce_deferral_timeout: true,
            deferral_timeout: timeout::DEFAULT_DEFERRAL_TIMEOUT,
            auto_rebuild: true,
        }
    }
}

impl PipelineConfig {
    /// Validate pipeline configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Validate pending limit
        if self.max_pending_per_channel == 0 {
            errors.push("Max pending per channel must be greater than 0".to_string());
        } else if self.max_pending_per_channel > 1_000_000 {
            errors.push(format!(
                "Max pending per channel too large: {} (max recommended: 1,000,000)",
                self.max_pending_per_channel
            ));
        }

        // Validate deferral timeout
        if self.enforce_deferral_timeout {
            if self.deferral_timeout.as_millis() < 10 {
                errors.push("Deferral timeout too short (minimum: 10ms)".to_string());
            } else if self.deferral_timeout.as_secs() > 300 {
                errors.push("Deferral timeout too long (maximum: 300s)".to_string());
            }
        } else {
            errors.push(
                "WARNING: Deferral timeout disabled - a listener that never resumes will block its channel forever"
                    .to_string(),
            );
        }

        errors
    }
}

/// Accessor/compiler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessorConfig {
    /// Whether per-shape indices are compiled on the background worker.
    /// When disabled, schemas registered through the pipeline are compiled
    /// synchronously at registration time instead.
    pub background_compile: bool,
}

impl Default for AccessorConfig {
    fn default() -> Self {
        Self {
            background_compile: true,
        }
    }
}

impl AccessorConfig {
    /// Validate accessor configuration
    pub fn validate(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("packet-intercept"),
            log_level: Level::INFO,
            log_to_console: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Validate app name
        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
