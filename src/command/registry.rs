//! Command registry - the source of truth for live commands.
//!
//! Maps canonical paths and alias paths to their [`CommandSpec`]. Every
//! mutation bumps a generation counter so derived indexes know when they
//! are stale.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use super::spec::{CommandPath, CommandSpec};
use crate::error::RegistryError;

/// Consistent copy of the registry at one generation.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub generation: u64,
    pub commands: BTreeMap<CommandPath, Arc<CommandSpec>>,
    pub aliases: BTreeMap<CommandPath, Arc<CommandSpec>>,
    /// Union of non-empty command prefixes.
    pub prefixes: Vec<String>,
}

#[derive(Default)]
struct RegistryInner {
    commands: BTreeMap<CommandPath, Arc<CommandSpec>>,
    aliases: BTreeMap<CommandPath, Arc<CommandSpec>>,
}

impl RegistryInner {
    /// Owner of whatever currently occupies `path`.
    fn owner_of(&self, path: &CommandPath) -> Option<&str> {
        self.commands
            .get(path)
            .or_else(|| self.aliases.get(path))
            .map(|spec| spec.owning_plugin.as_str())
    }

    /// Drop a command and every alias pointing at it.
    fn remove_command(&mut self, path: &CommandPath) {
        if let Some(old) = self.commands.remove(path) {
            self.aliases.retain(|_, spec| !Arc::ptr_eq(spec, &old));
        }
    }
}

/// Registry of all commands, keyed by canonical path.
#[derive(Default)]
pub struct CommandRegistry {
    inner: RwLock<RegistryInner>,
    generation: AtomicU64,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command and its aliases.
    ///
    /// Fails with [`RegistryError::DuplicatePath`] if any of its paths is
    /// owned by a different plugin. Paths already owned by the same plugin
    /// are replaced, which is what happens on reload.
    pub fn register(&self, spec: CommandSpec) -> Result<Arc<CommandSpec>, RegistryError> {
        if spec.path_words.is_empty() {
            return Err(RegistryError::EmptyPath);
        }

        let mut inner = self.inner.write();

        let paths = std::iter::once(&spec.path_words).chain(spec.aliases.iter());
        for path in paths.clone() {
            if let Some(existing) = inner.owner_of(path)
                && existing != spec.owning_plugin
            {
                return Err(RegistryError::DuplicatePath {
                    path: path.join(" "),
                    existing: existing.to_string(),
                    requested: spec.owning_plugin.clone(),
                });
            }
        }

        for path in paths {
            inner.remove_command(path);
            inner.aliases.remove(path);
        }

        let spec = Arc::new(spec);
        inner.commands.insert(spec.path_words.clone(), Arc::clone(&spec));
        for alias in &spec.aliases {
            inner.aliases.insert(alias.clone(), Arc::clone(&spec));
        }

        self.generation.fetch_add(1, Ordering::Release);
        debug!(
            "Registered command '{}' ({} aliases) for plugin '{}'",
            spec.name(),
            spec.aliases.len(),
            spec.owning_plugin
        );

        Ok(spec)
    }

    /// Remove every command and alias owned by `plugin`.
    ///
    /// Returns the number of commands removed.
    pub fn revoke_plugin(&self, plugin: &str) -> usize {
        let mut inner = self.inner.write();

        let before = inner.commands.len() + inner.aliases.len();
        let removed = inner
            .commands
            .values()
            .filter(|spec| spec.owning_plugin == plugin)
            .count();
        inner.commands.retain(|_, spec| spec.owning_plugin != plugin);
        inner.aliases.retain(|_, spec| spec.owning_plugin != plugin);

        if inner.commands.len() + inner.aliases.len() != before {
            self.generation.fetch_add(1, Ordering::Release);
            info!("Revoked {} commands of plugin '{}'", removed, plugin);
        }

        removed
    }

    pub fn all_commands(&self) -> BTreeMap<CommandPath, Arc<CommandSpec>> {
        self.inner.read().commands.clone()
    }

    pub fn all_aliases(&self) -> BTreeMap<CommandPath, Arc<CommandSpec>> {
        self.inner.read().aliases.clone()
    }

    /// Commands owned by one plugin, in path order.
    pub fn commands_of(&self, plugin: &str) -> Vec<Arc<CommandSpec>> {
        self.inner
            .read()
            .commands
            .values()
            .filter(|spec| spec.owning_plugin == plugin)
            .cloned()
            .collect()
    }

    /// Deduplicated non-empty prefixes across all commands.
    pub fn prefixes(&self) -> Vec<String> {
        collect_prefixes(&self.inner.read().commands)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Take a consistent snapshot for index building.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.read();
        RegistrySnapshot {
            generation: self.generation.load(Ordering::Acquire),
            commands: inner.commands.clone(),
            aliases: inner.aliases.clone(),
            prefixes: collect_prefixes(&inner.commands),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().commands.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("CommandRegistry")
            .field("commands", &inner.commands.len())
            .field("aliases", &inner.aliases.len())
            .field("generation", &self.generation())
            .finish()
    }
}

fn collect_prefixes(commands: &BTreeMap<CommandPath, Arc<CommandSpec>>) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    for prefix in commands.values().flat_map(|spec| spec.prefixes.iter()) {
        if !prefix.is_empty() && !prefixes.contains(prefix) {
            prefixes.push(prefix.clone());
        }
    }
    prefixes
}
