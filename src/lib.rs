#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Lintbridge Core
//!
//! Component core of the Lintbridge IDE static-analysis integration.
//!
//! ## Overview
//!
//! The host instantiates long-lived components lazily, in no particular order
//! and often off its primary (UI) thread. Many of those components must call
//! primary-thread-only host APIs during setup, depend on other components
//! already being consistent, and must never leak half-initialized behavior.
//! They also have to tolerate being disposed before setup finishes.
//!
//! This crate provides the dependency-ordered asynchronous initializer that
//! coordinates all of that, plus the thread-affinity capability it relies on.
//!
//! ## Module Organization
//!
//! - [`threading`] - Primary-thread detection and marshalling
//! - [`initialization`] - Initializer state machine, readiness handles, factory
//! - [`events`] - Observer registry for host and outward events
//! - [`consumers`] - Components built on the initializer
//! - [`bootstrap`] - Config + logging + primary thread + factory in one call
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lintbridge_core::consumers::{SolutionEvent, SolutionHost, SolutionTracker};
//! use lintbridge_core::events::EventHandler;
//! use lintbridge_core::initialization::RequiresInitialization;
//! use lintbridge_core::{EventSource, LintbridgeBootstrap, SubscriptionId};
//! use std::sync::Arc;
//!
//! /// Adapter over the IDE's solution service
//! struct IdeSolutionHost {
//!     events: EventSource<SolutionEvent>,
//! }
//!
//! impl SolutionHost for IdeSolutionHost {
//!     fn current_solution_name(&self) -> anyhow::Result<Option<String>> {
//!         Ok(std::env::var("IDE_SOLUTION").ok())
//!     }
//!
//!     fn subscribe_solution_events(&self, handler: EventHandler<SolutionEvent>) -> SubscriptionId {
//!         self.events.subscribe_handler(handler)
//!     }
//!
//!     fn unsubscribe_solution_events(&self, id: SubscriptionId) {
//!         self.events.unsubscribe(id);
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = LintbridgeBootstrap::bootstrap()?;
//! let host = Arc::new(IdeSolutionHost { events: EventSource::new("ide_solution_events") });
//!
//! let tracker = SolutionTracker::new(runtime.factory(), host);
//! tracker.initialization_processor().start().await?;
//! println!("active solution: {:?}", tracker.active_solution_name());
//!
//! runtime.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod consumers;
pub mod error;
pub mod events;
pub mod initialization;
pub mod logging;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod threading;

pub use bootstrap::{ComponentRuntime, LintbridgeBootstrap, RuntimeStatus};
pub use config::{ConfigManager, LintbridgeConfig};
pub use error::{ErrorSeverity, LintbridgeError, Result};
pub use events::{EventSource, SubscriptionId};
pub use initialization::{
    AsyncInitializer, AsyncInitializerFactory, CompletionSignal, InitializationError,
    InitializationState, ReadinessHandle, RequiresInitialization,
};
pub use threading::{PrimaryThread, ThreadAffinityError, ThreadHandling, ThreadHandlingExt};
