//! # Error Types
//!
//! Crate-level error type plus the recoverable/critical classification used by
//! consumer components when they handle failures inside host-event handlers.

use crate::config::ConfigurationError;
use crate::initialization::InitializationError;
use crate::threading::ThreadAffinityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Clone, Error)]
pub enum LintbridgeError {
    #[error("Initialization error: {0}")]
    Initialization(#[from] InitializationError),
    #[error("Thread affinity error: {0}")]
    ThreadAffinity(#[from] ThreadAffinityError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, LintbridgeError>;

/// Marker for failures that must never be swallowed by a component.
///
/// Wrap an error in `CriticalError` (or return one from a host call) to force
/// [`classify`] to treat it as [`ErrorSeverity::Critical`].
#[derive(Debug, Error)]
#[error("Critical failure: {message}")]
pub struct CriticalError {
    pub message: String,
}

impl CriticalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// How a failure caught by a component should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Log and continue
    Recoverable,
    /// Propagate; the process state can no longer be trusted
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable => write!(f, "recoverable"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Classify an error by walking its source chain.
///
/// Thread-affinity violations are programming errors and count as critical,
/// as does anything carrying a [`CriticalError`].
pub fn classify(err: &anyhow::Error) -> ErrorSeverity {
    for cause in err.chain() {
        if cause.is::<CriticalError>() || cause.is::<ThreadAffinityError>() {
            return ErrorSeverity::Critical;
        }
        if let Some(LintbridgeError::ThreadAffinity(_)) = cause.downcast_ref::<LintbridgeError>() {
            return ErrorSeverity::Critical;
        }
    }
    ErrorSeverity::Recoverable
}

/// Log and swallow a recoverable failure; hand back a critical one.
///
/// ```rust
/// use lintbridge_core::error::log_recoverable;
///
/// let outcome: anyhow::Result<()> = Err(anyhow::anyhow!("host call failed"));
/// assert!(log_recoverable("refresh", outcome).is_ok());
/// ```
pub fn log_recoverable(context: &str, result: anyhow::Result<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => match classify(&err) {
            ErrorSeverity::Recoverable => {
                warn!(context = %context, error = %err, "Recoverable failure, continuing");
                Ok(())
            }
            ErrorSeverity::Critical => {
                error!(context = %context, error = %err, "Critical failure, propagating");
                Err(err)
            }
        },
    }
}
