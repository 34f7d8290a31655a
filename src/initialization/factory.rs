use super::errors::InitializationError;
use super::initializer::{AsyncInitializer, ReadinessHandle, SetupDelegate};
use crate::config::InitializationConfig;
use crate::threading::ThreadHandling;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Stateless builder of [`AsyncInitializer`]s.
///
/// Injects the same thread-affinity capability and runtime handle into every
/// initializer it creates.
#[derive(Clone)]
pub struct AsyncInitializerFactory {
    thread_handling: Arc<dyn ThreadHandling>,
    runtime: Handle,
    slow_setup_warning: Option<Duration>,
}

impl AsyncInitializerFactory {
    pub fn new(thread_handling: Arc<dyn ThreadHandling>, runtime: Handle) -> Self {
        Self {
            thread_handling,
            runtime,
            slow_setup_warning: None,
        }
    }

    /// Build a factory on the runtime the caller is running in
    pub fn from_current_runtime(thread_handling: Arc<dyn ThreadHandling>) -> Result<Self, InitializationError> {
        let runtime = Handle::try_current().map_err(|e| InitializationError::RuntimeUnavailable {
            reason: e.to_string(),
        })?;
        Ok(Self::new(thread_handling, runtime))
    }

    /// Apply the `[initialization]` config section
    pub fn with_config(mut self, config: &InitializationConfig) -> Self {
        self.slow_setup_warning = config.slow_setup_warning();
        self
    }

    pub fn thread_handling(&self) -> &Arc<dyn ThreadHandling> {
        &self.thread_handling
    }

    /// Runtime the initializers' sequences are spawned on
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Build an initializer that does nothing until `start()` is called.
    ///
    /// `dependencies` are awaited in the given order before `setup` runs.
    pub fn create_manual<F, Fut>(
        &self,
        owner: impl Into<String>,
        dependencies: Vec<ReadinessHandle>,
        setup: F,
    ) -> AsyncInitializer
    where
        F: FnOnce(Arc<dyn ThreadHandling>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let delegate: SetupDelegate = Box::new(move |thread_handling| setup(thread_handling).boxed());
        AsyncInitializer::new(
            owner.into(),
            dependencies,
            Arc::clone(&self.thread_handling),
            self.runtime.clone(),
            self.slow_setup_warning,
            delegate,
        )
    }

    /// Build an initializer for a trivial synchronous payload and start it
    /// immediately.
    ///
    /// Equivalent to `create_manual` followed by a fire-and-forget `start()`;
    /// dependencies are still awaited asynchronously.
    pub fn create_and_start<F>(
        &self,
        owner: impl Into<String>,
        dependencies: Vec<ReadinessHandle>,
        action: F,
    ) -> AsyncInitializer
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let initializer = self.create_manual(owner, dependencies, move |_| async move { action() });
        initializer.start();
        initializer
    }
}

impl std::fmt::Debug for AsyncInitializerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncInitializerFactory")
            .field("slow_setup_warning", &self.slow_setup_warning)
            .finish()
    }
}
