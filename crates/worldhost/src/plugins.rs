//! Plugins: extensions loaded once the registry is complete.
//!
//! Plugins are compiled in and registered with a [`PluginManager`]; the
//! config's `plugins` list decides which of them load. A plugin sees the
//! finished [`Registry`] and may add chat commands.

use std::sync::Arc;

use crate::commands::{Command, CommandRegistry};
use crate::config::Properties;
use crate::registry::Registry;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin failed to initialize: {0}")]
    Init(String),
}

/// What a plugin can reach while loading.
pub struct PluginContext<'a> {
    registry: &'a Arc<Registry>,
    commands: &'a mut CommandRegistry,
}

impl<'a> PluginContext<'a> {
    pub(crate) fn new(registry: &'a Arc<Registry>, commands: &'a mut CommandRegistry) -> Self {
        Self { registry, commands }
    }

    /// The fully populated registry. Plugins may keep a clone.
    pub fn registry(&self) -> &Arc<Registry> {
        self.registry
    }

    pub fn properties(&self) -> &Properties {
        self.registry.properties()
    }

    pub fn register_command(&mut self, name: &str, command: Box<dyn Command>) {
        self.commands.register(name, command);
    }
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn on_load(&self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError>;
}

/// The plugins this binary knows about.
#[derive(Default)]
pub struct PluginManager {
    available: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        self.available.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// Loads the plugins named in `enabled`, in that order.
    ///
    /// A plugin that fails is logged and skipped; the rest still load.
    /// Returns the names of the plugins that loaded.
    pub fn load_plugins(&self, enabled: &[String], ctx: &mut PluginContext<'_>) -> Vec<String> {
        let mut loaded = Vec::new();
        for name in enabled {
            let Some(plugin) = self.available.iter().find(|p| p.name() == name) else {
                tracing::warn!(plugin = %name, "plugin not available");
                continue;
            };
            match plugin.on_load(ctx) {
                Ok(()) => {
                    tracing::info!(plugin = %name, "plugin loaded");
                    loaded.push(name.clone());
                }
                Err(e) => {
                    tracing::error!(plugin = %name, error = %e, "plugin failed to load");
                }
            }
        }
        loaded
    }
}
