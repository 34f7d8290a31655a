//! Host-side collaborators of the consumer components.
//!
//! These are the seams where the IDE host plugs in. Everything behind them is
//! host glue; the components only rely on the contracts stated here.

use crate::events::{EventHandler, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Solution lifecycle notification raised by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolutionEvent {
    Opened { name: String },
    Closed,
}

impl SolutionEvent {
    /// Name of the solution that is active after this event
    pub fn active_solution(&self) -> Option<&str> {
        match self {
            Self::Opened { name } => Some(name),
            Self::Closed => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Opened { .. } => "opened",
            Self::Closed => "closed",
        }
    }
}

/// Host solution service.
///
/// `current_solution_name` is a shell API and must be called on the primary
/// thread. Subscribing and unsubscribing are thread-agnostic.
pub trait SolutionHost: Send + Sync {
    fn current_solution_name(&self) -> anyhow::Result<Option<String>>;

    fn subscribe_solution_events(&self, handler: EventHandler<SolutionEvent>) -> SubscriptionId;

    fn unsubscribe_solution_events(&self, id: SubscriptionId);
}

/// How the active solution is bound to an analysis server
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BindingConfiguration {
    /// Local analysis only
    #[default]
    Standalone,
    /// Rules and settings come from a server project
    Connected {
        server_url: String,
        project_key: String,
    },
}

impl BindingConfiguration {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

impl fmt::Display for BindingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone => write!(f, "standalone"),
            Self::Connected {
                server_url,
                project_key,
            } => write!(f, "connected({project_key}@{server_url})"),
        }
    }
}

/// Source of per-solution binding settings. May block (reads settings files).
pub trait BindingConfigProvider: Send + Sync {
    fn binding_for(&self, solution_name: Option<&str>) -> anyhow::Result<BindingConfiguration>;
}
