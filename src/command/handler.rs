//! Handler functions and the invocation passed to them.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::Value;
use crate::event::SharedEvent;
use crate::trigger::BindResult;

/// Opaque per-plugin state handed to that plugin's handlers.
pub type PluginContext = Arc<dyn Any + Send + Sync>;

pub type SyncHandlerFn = dyn Fn(Invocation) -> anyhow::Result<()> + Send + Sync;
pub type AsyncHandlerFn = dyn Fn(Invocation) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// A registered handler.
///
/// Synchronous handlers run on the blocking pool so they cannot stall
/// dispatch; asynchronous handlers are awaited in place.
#[derive(Clone)]
pub enum Handler {
    Sync(Arc<SyncHandlerFn>),
    Async(Arc<AsyncHandlerFn>),
}

impl Handler {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::Async(Arc::new(move |invocation| Box::pin(f(invocation))))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Everything a handler receives for one call.
#[derive(Clone)]
pub struct Invocation {
    pub event: SharedEvent,
    pub args: BindResult,
    /// Name of the resolved command, `None` for filter and event handlers.
    pub command: Option<String>,
    pub plugin: Option<PluginContext>,
}

impl Invocation {
    /// Positional argument by declaration index.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.positional.get(index).filter(|v| !v.is_null())
    }

    /// Named option value.
    pub fn named(&self, name: &str) -> Option<&Value> {
        self.args.named.get(name)
    }

    /// Whether a flag option was set.
    pub fn flag(&self, name: &str) -> bool {
        self.named(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Downcast the owning plugin's context.
    pub fn plugin_state<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.plugin.as_ref().and_then(|ctx| ctx.downcast_ref::<T>())
    }

    pub async fn reply(&self, text: impl Into<String>) -> anyhow::Result<()> {
        self.event.reply(text.into()).await
    }

    /// Reply from a synchronous handler running on the blocking pool.
    pub fn reply_blocking(&self, text: impl Into<String>) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Handle::try_current()?;
        runtime.block_on(self.event.reply(text.into()))
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("event", &self.event)
            .field("args", &self.args)
            .field("command", &self.command)
            .field("has_plugin", &self.plugin.is_some())
            .finish()
    }
}
