//! Plugin API.
//!
//! A plugin registers its commands, filters and event handlers through a
//! [`PluginRegistrar`], which stamps the plugin's name on every record so
//! they can be revoked together.

use std::sync::Arc;

use dashmap::DashMap;

use super::CommandDispatcher;
use crate::command::{CommandRegistry, CommandSpec, PluginContext};
use crate::error::PluginError;
use crate::filters::{EventHandler, FilterHandler};

pub trait Plugin: Send + Sync {
    /// Unique plugin name; owns every record the plugin registers.
    fn name(&self) -> &str;

    fn register(&self, registrar: &PluginRegistrar<'_>) -> Result<(), PluginError>;

    /// State handed to this plugin's handlers via `Invocation::plugin`.
    fn context(&self) -> Option<PluginContext> {
        None
    }
}

/// Resolves a plugin name to its handler context.
///
/// Results are memoized by the dispatcher until the next lifecycle change.
pub trait PluginContextProvider: Send + Sync {
    fn context(&self, plugin: &str) -> Option<PluginContext>;
}

/// Default provider: contexts of plugins loaded through the dispatcher.
#[derive(Default)]
pub(crate) struct LoadedPlugins {
    plugins: DashMap<String, Arc<dyn Plugin>>,
}

impl LoadedPlugins {
    pub(crate) fn insert(&self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub(crate) fn remove(&self, name: &str) -> bool {
        self.plugins.remove(name).is_some()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}

impl PluginContextProvider for LoadedPlugins {
    fn context(&self, plugin: &str) -> Option<PluginContext> {
        self.plugins.get(plugin).and_then(|entry| entry.value().context())
    }
}

/// Registration handle passed to [`Plugin::register`].
pub struct PluginRegistrar<'a> {
    dispatcher: &'a CommandDispatcher,
    plugin: String,
}

impl<'a> PluginRegistrar<'a> {
    pub(crate) fn new(dispatcher: &'a CommandDispatcher, plugin: impl Into<String>) -> Self {
        Self {
            dispatcher,
            plugin: plugin.into(),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn command(&self, spec: CommandSpec) -> Result<(), PluginError> {
        self.dispatcher.register_command(spec.owned_by(self.plugin.as_str()))?;
        Ok(())
    }

    pub fn filter(&self, handler: FilterHandler) {
        self.dispatcher.register_filter(handler.owned_by(self.plugin.as_str()));
    }

    pub fn event(&self, handler: EventHandler) {
        self.dispatcher.register_event_handler(handler.owned_by(self.plugin.as_str()));
    }

    /// Shared command registry, e.g. for a help command listing everything.
    pub fn registry(&self) -> Arc<CommandRegistry> {
        Arc::clone(self.dispatcher.registry())
    }
}
