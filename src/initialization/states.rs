use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a component's initializer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InitializationState {
    /// Constructed; no start requested yet
    #[default]
    NotStarted,
    /// Waiting on dependencies or running the setup delegate
    Initializing,
    /// Completion signal resolved (success, failure, or abandonment)
    Initialized,
    /// Owner disposed; reported regardless of how far the sequence got
    Disposed,
}

impl InitializationState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Initialized | Self::Disposed)
    }

    /// Check if the sequence is currently in flight
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initializing)
    }
}

impl fmt::Display for InitializationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Initializing => write!(f, "initializing"),
            Self::Initialized => write!(f, "initialized"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

impl std::str::FromStr for InitializationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "initializing" => Ok(Self::Initializing),
            "initialized" => Ok(Self::Initialized),
            "disposed" => Ok(Self::Disposed),
            _ => Err(format!("Invalid initialization state: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_check() {
        assert!(InitializationState::Initialized.is_terminal());
        assert!(InitializationState::Disposed.is_terminal());
        assert!(!InitializationState::NotStarted.is_terminal());
        assert!(!InitializationState::Initializing.is_terminal());
        assert!(InitializationState::Initializing.is_active());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(InitializationState::NotStarted.to_string(), "not_started");
        assert_eq!(
            "initializing".parse::<InitializationState>().unwrap(),
            InitializationState::Initializing
        );
        assert!("ready".parse::<InitializationState>().is_err());
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&InitializationState::Disposed).unwrap();
        assert_eq!(json, "\"disposed\"");

        let parsed: InitializationState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, InitializationState::Disposed);
        assert_eq!(InitializationState::default(), InitializationState::NotStarted);
    }
}
