//! # Component Runtime Bootstrap
//!
//! Wires the ambient pieces a host needs before it can construct components:
//! configuration, logging, the primary thread, and an initializer factory
//! bound to the current tokio runtime.
//!
//! Hosts that own a real UI thread build their own [`AsyncInitializerFactory`]
//! around their dispatcher instead; this entry point is for hosts that do not.

use crate::config::ConfigManager;
use crate::consumers::FeatureFlagService;
use crate::error::Result;
use crate::initialization::{AsyncInitializerFactory, RequiresInitialization};
use crate::logging::init_structured_logging;
use crate::threading::{PrimaryThread, ThreadHandling};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Handle over the running component infrastructure
pub struct ComponentRuntime {
    config_manager: Arc<ConfigManager>,
    primary_thread: Arc<PrimaryThread>,
    factory: AsyncInitializerFactory,
    feature_flags: Arc<FeatureFlagService>,
}

/// Snapshot returned by [`ComponentRuntime::status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    pub environment: String,
    pub primary_thread: String,
    pub accepting_primary_work: bool,
    pub feature_flags_ready: bool,
}

impl ComponentRuntime {
    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    pub fn primary_thread(&self) -> &Arc<PrimaryThread> {
        &self.primary_thread
    }

    /// Factory for building further components on this runtime
    pub fn factory(&self) -> &AsyncInitializerFactory {
        &self.factory
    }

    pub fn feature_flags(&self) -> &Arc<FeatureFlagService> {
        &self.feature_flags
    }

    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            environment: self.config_manager.environment().to_string(),
            primary_thread: self.primary_thread.name().to_string(),
            accepting_primary_work: self.primary_thread.is_accepting_work(),
            feature_flags_ready: self.feature_flags.initialization_processor().is_initialized(),
        }
    }

    /// Dispose the built-in components and stop the primary thread. Idempotent.
    pub fn shutdown(&self) {
        self.feature_flags.dispose();
        self.primary_thread.shutdown();
        info!("🛑 BOOTSTRAP: Component runtime shut down");
    }
}

impl std::fmt::Debug for ComponentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRuntime")
            .field("status", &self.status())
            .finish()
    }
}

pub struct LintbridgeBootstrap;

impl LintbridgeBootstrap {
    /// Load configuration from the environment and bootstrap.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bootstrap() -> Result<ComponentRuntime> {
        let config_manager = ConfigManager::load()?;
        Self::bootstrap_with_config(config_manager)
    }

    /// Bootstrap from an already loaded configuration
    pub fn bootstrap_with_config(config_manager: Arc<ConfigManager>) -> Result<ComponentRuntime> {
        let config = config_manager.config();
        init_structured_logging(&config.logging);

        info!(
            environment = %config_manager.environment(),
            "🚀 BOOTSTRAP: Starting component runtime"
        );

        let primary_thread = PrimaryThread::spawn(config.threading.primary_thread_name.clone())?;
        let thread_handling: Arc<dyn ThreadHandling> = Arc::clone(&primary_thread) as Arc<dyn ThreadHandling>;

        let factory = match AsyncInitializerFactory::from_current_runtime(thread_handling) {
            Ok(factory) => factory.with_config(&config.initialization),
            Err(e) => {
                primary_thread.shutdown();
                return Err(e.into());
            }
        };

        let feature_flags = FeatureFlagService::new(&factory, &config.features);

        info!(
            primary_thread = %primary_thread.name(),
            "✅ BOOTSTRAP: Component runtime ready"
        );

        Ok(ComponentRuntime {
            config_manager,
            primary_thread,
            factory,
            feature_flags,
        })
    }
}
