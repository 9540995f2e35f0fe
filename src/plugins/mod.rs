//! Bot plugins.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `mod your_plugin;` below
//! 3. Adding the plugin to `all()`

mod base;
mod greet;
mod moderation;
mod say;
mod stats;

use std::sync::Arc;

use herald::Plugin;

use crate::bot::ThrottledBot;

/// Every plugin the bot ships with, in load order.
pub fn all(bot: &ThrottledBot) -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(base::CorePlugin::new(bot.clone())),
        Arc::new(moderation::ModerationPlugin::new(bot.clone())),
        Arc::new(say::SayPlugin),
        Arc::new(stats::StatsPlugin::default()),
        Arc::new(greet::GreetPlugin),
    ]
}
