use thiserror::Error;

/// Failures raised by the thread-affinity capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadAffinityError {
    #[error("Operation '{operation}' must run on the primary thread")]
    ExpectedPrimary { operation: String },

    #[error("Operation '{operation}' must not run on the primary thread")]
    ExpectedBackground { operation: String },

    #[error("Primary thread is not accepting work")]
    PrimaryThreadUnavailable,

    #[error("Work dispatched to the primary thread was dropped before producing a result")]
    PrimaryWorkAbandoned,

    #[error("Failed to spawn primary thread '{name}': {message}")]
    SpawnFailed { name: String, message: String },

    #[error("Background work failed: {message}")]
    BackgroundWorkFailed { message: String },
}

impl ThreadAffinityError {
    pub fn expected_primary(operation: impl Into<String>) -> Self {
        Self::ExpectedPrimary {
            operation: operation.into(),
        }
    }

    pub fn expected_background(operation: impl Into<String>) -> Self {
        Self::ExpectedBackground {
            operation: operation.into(),
        }
    }
}
