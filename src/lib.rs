//! Herald - command resolution and dispatch engine.
//!
//! Turns inbound chat messages into validated invocations of registered
//! plugin handlers.
//!
//! ## Architecture
//!
//! - `event` - Event abstraction handed to the engine by the transport
//! - `command` - Lexer, command specs and the command registry
//! - `trigger` - Preprocessor, trie resolver and argument binder
//! - `filters` - Filter predicates, validator and pure-filter registry
//! - `dispatch` - Orchestrator, notifications and plugin lifecycle
//! - `cache` - LRU-based caching with Moka
//! - `config` - Environment configuration

pub mod cache;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod filters;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use command::{CommandRegistry, CommandSpec, Handler, Invocation, OptionSpec, ParamSpec, ParamType, Value};
pub use config::DispatchConfig;
pub use dispatch::{
    ChannelSink, CommandDispatcher, LogSink, Notification, NotificationKind, NotificationSink, Plugin,
    PluginContextProvider, PluginRegistrar,
};
pub use error::{BindError, BuildError, PluginError, RegistryError};
pub use event::{BotEvent, ChatKind, PostType, Role, Segment, SharedEvent};
pub use filters::{EventHandler, Filter, FilterHandler, HandlerMeta};
