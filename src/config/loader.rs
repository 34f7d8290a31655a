//! Configuration Loader
//!
//! Environment-aware configuration loading built on the `config` crate.
//! Handles environment detection, optional file discovery, and environment
//! variable overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::{LintbridgeConfig, LoggingConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const ENV_PREFIX: &str = "LINTBRIDGE";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_CONFIG_FILE: &str = "lintbridge.toml";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: LintbridgeConfig,
    environment: String,
    source_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection.
    ///
    /// Reads `LINTBRIDGE_CONFIG` if set (the file must exist), otherwise an
    /// optional `lintbridge.toml` in the working directory.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        match env::var("LINTBRIDGE_CONFIG") {
            Ok(path) => Self::load_with_sources(Some((Path::new(&path), true)), &environment, None),
            Err(_) => Self::load_with_sources(Some((Path::new(DEFAULT_CONFIG_FILE), false)), &environment, None),
        }
    }

    /// Load configuration from a specific file, which must exist
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_with_sources(Some((path.as_ref(), true)), &environment, None)
    }

    /// Load configuration with every source explicit.
    ///
    /// `env_overrides` replaces the process environment as the source of
    /// `LINTBRIDGE__*` variables, which keeps tests from mutating global state.
    pub fn load_with_sources(
        file: Option<(&Path, bool)>,
        environment: &str,
        env_overrides: Option<config::Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let defaults = LintbridgeConfig {
            environment: environment.to_string(),
            logging: LoggingConfig {
                level: Self::default_log_level(environment).to_string(),
                ..LoggingConfig::default()
            },
            ..LintbridgeConfig::default()
        };

        let mut builder = config::Config::builder().add_source(config::Config::try_from(&defaults)?);

        let mut source_file = None;
        if let Some((path, required)) = file {
            if path.exists() {
                source_file = Some(path.to_path_buf());
            } else if required {
                return Err(ConfigurationError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(required));
        }

        let environment_source = config::Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("features.enabled")
            .source(env_overrides);
        builder = builder.add_source(environment_source);

        let config: LintbridgeConfig = builder.build()?.try_deserialize()?;
        Self::from_parts(config, source_file)
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: LintbridgeConfig) -> ConfigResult<Arc<ConfigManager>> {
        Self::from_parts(config, None)
    }

    fn from_parts(config: LintbridgeConfig, source_file: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;

        debug!(
            environment = %config.environment,
            source_file = ?source_file,
            config = %serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string()),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            environment: config.environment.clone(),
            config,
            source_file,
        }))
    }

    pub fn config(&self) -> &LintbridgeConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was read from, if any
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("LINTBRIDGE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    /// Default log level for an environment
    pub fn default_log_level(environment: &str) -> &'static str {
        match environment {
            "production" => "info",
            _ => "debug",
        }
    }
}
