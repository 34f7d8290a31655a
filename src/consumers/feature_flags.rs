//! Feature flags loaded from configuration.
//!
//! The simplest consumer: no dependencies, no primary-thread work, so it uses
//! the auto-start factory mode.

use crate::config::FeatureFlagsConfig;
use crate::initialization::{AsyncInitializer, AsyncInitializerFactory, RequiresInitialization};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

pub struct FeatureFlagService {
    initializer: AsyncInitializer,
    flags: Arc<DashMap<String, bool>>,
    overrides: DashMap<String, bool>,
}

impl FeatureFlagService {
    pub const OWNER: &'static str = "FeatureFlagService";

    pub fn new(factory: &AsyncInitializerFactory, config: &FeatureFlagsConfig) -> Arc<Self> {
        let flags = Arc::new(DashMap::new());
        let enabled = config.enabled.clone();

        let initializer = factory.create_and_start(Self::OWNER, Vec::new(), {
            let flags = Arc::clone(&flags);
            move || {
                for flag in enabled {
                    flags.insert(flag, true);
                }
                debug!(component = Self::OWNER, count = flags.len(), "Feature flags loaded");
                Ok(())
            }
        });

        Arc::new(Self {
            initializer,
            flags,
            overrides: DashMap::new(),
        })
    }

    /// Whether `flag` is on. Every flag reads as off until the service is
    /// ready, and again once it is disposed.
    pub fn is_enabled(&self, flag: &str) -> bool {
        if !self.is_live() {
            return false;
        }
        if let Some(value) = self.overrides.get(flag) {
            return *value;
        }
        self.flags.get(flag).map(|value| *value).unwrap_or(false)
    }

    /// Force a flag on or off for the rest of the service's lifetime.
    /// Ignored once disposed.
    pub fn set_override(&self, flag: impl Into<String>, enabled: bool) {
        let flag = flag.into();
        if self.initializer.is_disposed() {
            debug!(component = Self::OWNER, flag = %flag, "Override ignored after disposal");
            return;
        }
        self.overrides.insert(flag, enabled);
    }

    /// Sorted names of the flags that are currently on
    pub fn enabled_flags(&self) -> Vec<String> {
        if !self.is_live() {
            return Vec::new();
        }
        let mut names: Vec<String> = self
            .flags
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.overrides.iter().map(|entry| entry.key().clone()))
            .filter(|name| self.is_enabled(name))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn dispose(&self) {
        self.initializer.dispose();
    }

    fn is_live(&self) -> bool {
        self.initializer.is_initialized() && !self.initializer.is_disposed()
    }
}

impl RequiresInitialization for FeatureFlagService {
    fn initialization_processor(&self) -> &AsyncInitializer {
        &self.initializer
    }
}
