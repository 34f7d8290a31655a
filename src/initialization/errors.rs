use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure captured from a setup delegate.
///
/// Holds the delegate's `anyhow::Error` behind an `Arc` so one failure can be
/// replayed to every awaiter of the completion signal.
#[derive(Clone)]
pub struct SetupFailure(Arc<anyhow::Error>);

impl SetupFailure {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// The error exactly as the delegate returned it
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Debug for SetupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SetupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for SetupFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().source()
    }
}

/// Outcome errors of an initialization sequence
#[derive(Error, Debug, Clone)]
pub enum InitializationError {
    #[error("Setup of '{owner}' failed: {failure}")]
    SetupFailed {
        owner: String,
        #[source]
        failure: SetupFailure,
    },

    #[error("Setup of '{owner}' panicked: {message}")]
    SetupPanicked { owner: String, message: String },

    #[error("Dependency '{dependency}' of '{owner}' failed to initialize")]
    DependencyFailed {
        owner: String,
        dependency: String,
        #[source]
        cause: Box<InitializationError>,
    },

    #[error("Initialization of '{owner}' was dropped before it completed")]
    SequenceDropped { owner: String },

    #[error("No async runtime available: {reason}")]
    RuntimeUnavailable { reason: String },
}

impl InitializationError {
    /// Owner id of the component whose sequence produced this error
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::SetupFailed { owner, .. }
            | Self::SetupPanicked { owner, .. }
            | Self::DependencyFailed { owner, .. }
            | Self::SequenceDropped { owner } => Some(owner),
            Self::RuntimeUnavailable { .. } => None,
        }
    }

    /// The delegate error at the root of this failure, following dependency
    /// failures down to the component whose setup actually failed
    pub fn setup_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::SetupFailed { failure, .. } => Some(failure.error()),
            Self::DependencyFailed { cause, .. } => cause.setup_error(),
            _ => None,
        }
    }

    /// Owner id of the component whose own sequence failed first
    pub fn root_owner(&self) -> Option<&str> {
        match self {
            Self::DependencyFailed { cause, .. } => cause.root_owner(),
            other => other.owner(),
        }
    }
}
