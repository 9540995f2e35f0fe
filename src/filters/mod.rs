//! Filter system.
//!
//! Filters are pure predicates over (handler metadata, event). A handler
//! runs only if every attached filter passes.
//!
//! ## Built-in filters
//!
//! - `group_only` / `private_only` - chat kind gates
//! - `admin_only` - sender is a chat admin or owner
//! - `owner_only` - sender is the chat owner (or a bot owner)
//!
//! Roles are resolved by the transport before dispatch, so every filter
//! stays synchronous and side-effect free.

mod registry;
mod validator;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::event::{BotEvent, ChatKind, Role};

pub use registry::{EventHandler, FilterHandler, FilterRegistry};
pub use validator::validate_filters;

/// What a filter may know about the handler it guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerMeta {
    pub name: String,
    pub owning_plugin: String,
}

impl HandlerMeta {
    pub fn new(name: impl Into<String>, owning_plugin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owning_plugin: owning_plugin.into(),
        }
    }
}

pub type PredicateFn = dyn Fn(&HandlerMeta, &dyn BotEvent) -> bool + Send + Sync;

/// A named filter predicate.
#[derive(Clone)]
pub struct Filter {
    name: Cow<'static, str>,
    predicate: Arc<PredicateFn>,
}

impl Filter {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, predicate: F) -> Self
    where
        F: Fn(&HandlerMeta, &dyn BotEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, meta: &HandlerMeta, event: &dyn BotEvent) -> bool {
        (self.predicate)(meta, event)
    }

    pub fn group_only() -> Self {
        Self::new("group_only", |_, event| event.chat_kind() == ChatKind::Group)
    }

    pub fn private_only() -> Self {
        Self::new("private_only", |_, event| event.chat_kind() == ChatKind::Private)
    }

    pub fn admin_only() -> Self {
        Self::new("admin_only", |_, event| event.sender_role() >= Role::Admin)
    }

    pub fn owner_only() -> Self {
        Self::new("owner_only", |_, event| event.sender_role() == Role::Owner)
    }

    /// Only these sender IDs pass.
    pub fn senders(ids: impl IntoIterator<Item = u64>) -> Self {
        let ids: Vec<u64> = ids.into_iter().collect();
        Self::new("senders", move |_, event| ids.contains(&event.sender_id()))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Filter").field(&self.name).finish()
    }
}
