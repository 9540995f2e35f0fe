//! Registry for pure filter handlers and non-message event handlers.
//!
//! Pure filter handlers are not tied to a command: they run for every
//! message event, gated only by their own filters. Event handlers run for
//! notice and request events.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, info};

use super::{Filter, HandlerMeta};
use crate::command::Handler;
use crate::event::PostType;

/// A handler invoked for every message event that passes its filters.
#[derive(Debug, Clone)]
pub struct FilterHandler {
    pub name: String,
    pub filters: Vec<Filter>,
    pub handler: Handler,
    pub owning_plugin: String,
}

impl FilterHandler {
    pub fn new(name: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            filters: Vec::new(),
            handler,
            owning_plugin: String::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn owned_by(mut self, plugin: impl Into<String>) -> Self {
        self.owning_plugin = plugin.into();
        self
    }

    pub fn meta(&self) -> HandlerMeta {
        HandlerMeta::new(self.name.clone(), self.owning_plugin.clone())
    }
}

/// A handler for notice or request events.
#[derive(Debug, Clone)]
pub struct EventHandler {
    pub name: String,
    pub post_type: PostType,
    pub filters: Vec<Filter>,
    pub handler: Handler,
    pub owning_plugin: String,
}

impl EventHandler {
    pub fn new(name: impl Into<String>, post_type: PostType, handler: Handler) -> Self {
        Self {
            name: name.into(),
            post_type,
            filters: Vec::new(),
            handler,
            owning_plugin: String::new(),
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn owned_by(mut self, plugin: impl Into<String>) -> Self {
        self.owning_plugin = plugin.into();
        self
    }

    pub fn meta(&self) -> HandlerMeta {
        HandlerMeta::new(self.name.clone(), self.owning_plugin.clone())
    }
}

/// Concurrent registry of filter and event handlers.
///
/// Handlers are returned in registration order.
#[derive(Default)]
pub struct FilterRegistry {
    filters: DashMap<u64, Arc<FilterHandler>>,
    events: DashMap<u64, Arc<EventHandler>>,
    next_id: AtomicU64,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_filter(&self, handler: FilterHandler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Registered filter handler '{}' (id {})", handler.name, id);
        self.filters.insert(id, Arc::new(handler));
        id
    }

    pub fn register_event(&self, handler: EventHandler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Registered {:?} handler '{}' (id {})",
            handler.post_type, handler.name, id
        );
        self.events.insert(id, Arc::new(handler));
        id
    }

    /// All pure filter handlers.
    pub fn filter_handlers(&self) -> Vec<Arc<FilterHandler>> {
        let mut entries: Vec<(u64, Arc<FilterHandler>)> = self
            .filters
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, handler)| handler).collect()
    }

    /// Event handlers subscribed to `post_type`.
    pub fn event_handlers(&self, post_type: PostType) -> Vec<Arc<EventHandler>> {
        let mut entries: Vec<(u64, Arc<EventHandler>)> = self
            .events
            .iter()
            .filter(|entry| entry.value().post_type == post_type)
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, handler)| handler).collect()
    }

    /// Remove every handler owned by `plugin`. Returns how many were removed.
    pub fn revoke_plugin(&self, plugin: &str) -> usize {
        let mut removed = 0;
        self.filters.retain(|_, handler| {
            let keep = handler.owning_plugin != plugin;
            removed += usize::from(!keep);
            keep
        });
        self.events.retain(|_, handler| {
            let keep = handler.owning_plugin != plugin;
            removed += usize::from(!keep);
            keep
        });
        if removed > 0 {
            info!("Revoked {} filter/event handlers of plugin '{}'", removed, plugin);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.filters.len() + self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
