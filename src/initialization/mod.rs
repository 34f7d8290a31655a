//! # Component Initialization
//!
//! Dependency-ordered asynchronous initialization for long-lived components.
//!
//! Components are constructed by the host in unspecified order, on arbitrary
//! threads. Each one owns an [`AsyncInitializer`] built by the
//! [`AsyncInitializerFactory`], declares the [`ReadinessHandle`]s of the
//! components it depends on, and defers all host calls, event subscriptions,
//! and derived state into a setup delegate. The delegate runs at most once,
//! strictly after every declared dependency has resolved, and never after the
//! owner has been disposed.
//!
//! ## Dependency graph
//!
//! Dependencies are handles to initializers that already exist, and they are
//! fixed at construction. A dependency cycle therefore cannot be expressed
//! through this API. Ordering is per edge; no global sort is computed.
//!
//! ## Failure policy
//!
//! - Setup failure: captured once, replayed to every awaiter, never retried.
//! - Setup panic: captured as [`InitializationError::SetupPanicked`].
//! - Dependency failure: the dependent resolves with
//!   [`InitializationError::DependencyFailed`] and its delegate never runs.
//! - Dependency disposed early (abandoned): not a failure; the dependent
//!   proceeds to its own disposed check.
//!
//! ## Usage
//!
//! ```rust
//! use lintbridge_core::initialization::AsyncInitializerFactory;
//! use lintbridge_core::PrimaryThread;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let primary = PrimaryThread::spawn("ui")?;
//! let factory = AsyncInitializerFactory::from_current_runtime(primary.clone())?;
//!
//! let settings = factory.create_manual("Settings", Vec::new(), |_| async { Ok(()) });
//! let tracker = factory.create_manual("Tracker", vec![settings.readiness()], |_| async { Ok(()) });
//!
//! // Starting the dependent starts and awaits its dependencies first
//! tracker.start().await?;
//! assert!(settings.is_initialized());
//! primary.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod factory;
pub mod initializer;
pub mod signal;
pub mod states;

pub use errors::{InitializationError, SetupFailure};
pub use factory::AsyncInitializerFactory;
pub use initializer::{AsyncInitializer, ReadinessHandle, RequiresInitialization};
pub use signal::{CompletionSignal, InitializationOutcome};
pub use states::InitializationState;
