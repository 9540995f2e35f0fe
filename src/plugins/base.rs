//! Base plugin: /start, /ping and /help.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use teloxide::prelude::*;

use herald::command::{CommandRegistry, PluginContext};
use herald::{CommandSpec, Handler, Invocation, Plugin, PluginError, PluginRegistrar};

use crate::bot::ThrottledBot;

pub struct CorePlugin {
    bot: ThrottledBot,
}

struct CoreContext {
    bot: ThrottledBot,
}

impl CorePlugin {
    pub fn new(bot: ThrottledBot) -> Self {
        Self { bot }
    }
}

impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        "core"
    }

    fn register(&self, registrar: &PluginRegistrar<'_>) -> Result<(), PluginError> {
        registrar.command(
            CommandSpec::new("start", Handler::from_async(start))
                .describe("Introduce the bot"),
        )?;

        registrar.command(
            CommandSpec::new("ping", Handler::from_async(ping))
                .describe("Measure Telegram API latency"),
        )?;

        let registry = registrar.registry();
        registrar.command(
            CommandSpec::new(
                "help",
                Handler::from_async(move |inv| help(inv, Arc::clone(&registry))),
            )
            .alias("commands")
            .describe("List available commands"),
        )?;

        Ok(())
    }

    fn context(&self) -> Option<PluginContext> {
        Some(Arc::new(CoreContext { bot: self.bot.clone() }))
    }
}

async fn start(inv: Invocation) -> anyhow::Result<()> {
    inv.reply("Hi! I'm Herald. Send /help to see what I can do.").await
}

async fn ping(inv: Invocation) -> anyhow::Result<()> {
    let bot = inv
        .plugin_state::<CoreContext>()
        .context("core context missing")?
        .bot
        .clone();

    // Measure time to call getMe (lightweight API call)
    let start = Instant::now();
    bot.get_me().await?;
    let ms = start.elapsed().as_millis();

    inv.reply(format!("Pong! {ms}ms")).await
}

async fn help(inv: Invocation, registry: Arc<CommandRegistry>) -> anyhow::Result<()> {
    inv.reply(help_text(&registry)).await
}

fn help_text(registry: &CommandRegistry) -> String {
    let mut lines = vec!["Available commands:".to_string()];
    for spec in registry.all_commands().values() {
        let prefix = spec.prefixes.first().map(String::as_str).unwrap_or_default();
        if spec.description.is_empty() {
            lines.push(format!("{prefix}{}", spec.usage()));
        } else {
            lines.push(format!("{prefix}{} - {}", spec.usage(), spec.description));
        }
    }
    lines.join("\n")
}
