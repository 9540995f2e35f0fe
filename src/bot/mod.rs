//! Bot module - Telegram transport for the engine.

pub mod dispatcher;
pub mod event;
mod notify;
mod runtime;
mod webhook;

pub use dispatcher::{AppState, ThrottledBot, build_dispatcher};
pub use notify::ReplySink;
pub use runtime::run;
