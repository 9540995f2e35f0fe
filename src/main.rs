//! Herald - Telegram bot driven by the Herald command engine.
//!
//! ## Architecture
//!
//! - `bot` - Telegram transport: events, dispatcher, polling/webhook runtime
//! - `permissions` - Sender role lookup with caching
//! - `plugins` - Commands, filters and event handlers (extensible)

mod bot;
mod permissions;
mod plugins;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use herald::CommandDispatcher;
use herald::config::Config;

use bot::{AppState, ReplySink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("herald=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Herald bot...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);
    info!("Dispatch: {:?}", config.dispatch);

    // Throttle respects Telegram's rate limits:
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    // - 20 messages per minute to the same group
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());
    info!("Bot initialized with rate limiting (Throttle)");

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    if config.owner_ids.is_empty() {
        info!("No owner IDs configured (OWNER_IDS is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_ids);
    }

    let engine = Arc::new(CommandDispatcher::new(config.dispatch.clone()).with_sink(Arc::new(ReplySink::default())));
    for plugin in plugins::all(&bot) {
        engine.load_plugin(plugin)?;
    }
    info!(
        "Loaded plugins {:?} ({} commands)",
        engine.loaded_plugins(),
        engine.registry().len()
    );

    let state = AppState::new(&bot, engine, config.owner_ids.clone());
    let dispatcher = bot::build_dispatcher(bot.clone(), state);

    bot::run(&config, bot, dispatcher).await
}
