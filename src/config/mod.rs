//! # Lintbridge Configuration
//!
//! Layered configuration for the component core:
//!
//! 1. built-in defaults ([`LintbridgeConfig::default`])
//! 2. an optional `lintbridge.toml` (or an explicit file path)
//! 3. environment variables prefixed `LINTBRIDGE__`, with `__` between
//!    nested keys (`LINTBRIDGE__LOGGING__LEVEL=info`)
//!
//! The environment name comes from `LINTBRIDGE_ENV` and selects the default
//! log level.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lintbridge_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let primary_thread_name = &manager.config().threading.primary_thread_name;
//! let slow_setup = manager.config().initialization.slow_setup_warning();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LintbridgeConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Structured logging settings
    pub logging: LoggingConfig,

    /// Primary thread settings
    pub threading: ThreadingConfig,

    /// Initializer behaviour
    pub initialization: InitializationConfig,

    /// Feature flags read by the feature-flag service
    pub features: FeatureFlagsConfig,
}

impl Default for LintbridgeConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            logging: LoggingConfig::default(),
            threading: ThreadingConfig::default(),
            initialization: InitializationConfig::default(),
            features: FeatureFlagsConfig::default(),
        }
    }
}

impl LintbridgeConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.environment.trim().is_empty() {
            return Err(ConfigurationError::invalid_value("environment", "must not be empty"));
        }
        self.logging.validate()?;
        self.threading.validate()?;
        self.features.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
    /// Also write JSON logs to `directory`
    pub json_file: bool,
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            json_file: false,
            directory: PathBuf::from("log"),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        let level = self.level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigurationError::invalid_value(
                "logging.level",
                format!("'{}' is not one of {}", self.level, VALID_LOG_LEVELS.join(", ")),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThreadingConfig {
    /// Name given to the dedicated primary thread
    pub primary_thread_name: String,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            primary_thread_name: "lintbridge-primary".to_string(),
        }
    }
}

impl ThreadingConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.primary_thread_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "threading.primary_thread_name",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InitializationConfig {
    /// Warn when a setup delegate runs longer than this; 0 disables the warning.
    /// Never a timeout.
    pub slow_setup_warning_ms: u64,
}

impl Default for InitializationConfig {
    fn default() -> Self {
        Self {
            slow_setup_warning_ms: 2000,
        }
    }
}

impl InitializationConfig {
    pub fn slow_setup_warning(&self) -> Option<Duration> {
        (self.slow_setup_warning_ms > 0).then(|| Duration::from_millis(self.slow_setup_warning_ms))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureFlagsConfig {
    /// Names of flags that are switched on
    pub enabled: Vec<String>,
}

impl FeatureFlagsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(blank) = self.enabled.iter().position(|flag| flag.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                format!("features.enabled[{blank}]"),
                "flag names must not be empty",
            ));
        }
        Ok(())
    }
}
