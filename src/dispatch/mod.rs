//! Dispatch module.
//!
//! ## Components
//!
//! - `orchestrator` - `CommandDispatcher`, the end-to-end pipeline and index lifecycle
//! - `notify` - Failure notifications and their sinks
//! - `plugin` - Plugin trait, registrar and context providers

mod notify;
mod orchestrator;
mod plugin;

pub use notify::{ChannelSink, LogSink, Notification, NotificationKind, NotificationSink};
pub use orchestrator::CommandDispatcher;
pub use plugin::{Plugin, PluginContextProvider, PluginRegistrar};
