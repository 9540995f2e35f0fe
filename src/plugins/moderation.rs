//! Moderation plugin: /ban, /kick and /mute.
//!
//! Every command is restricted to group admins by filters, so handlers only
//! deal with the Telegram calls.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, UserId};

use herald::command::PluginContext;
use herald::{
    CommandSpec, Filter, Handler, Invocation, OptionSpec, ParamSpec, ParamType, Plugin, PluginError,
    PluginRegistrar, Value,
};

use crate::bot::ThrottledBot;

pub struct ModerationPlugin {
    bot: ThrottledBot,
}

struct ModerationContext {
    bot: ThrottledBot,
}

impl ModerationPlugin {
    pub fn new(bot: ThrottledBot) -> Self {
        Self { bot }
    }
}

impl Plugin for ModerationPlugin {
    fn name(&self) -> &str {
        "moderation"
    }

    fn register(&self, registrar: &PluginRegistrar<'_>) -> Result<(), PluginError> {
        registrar.command(
            admin_command("ban", Handler::from_async(ban))
                .param(ParamSpec::required("user_id", ParamType::Int))
                .param(ParamSpec::optional("reason", ParamType::Rest))
                .describe("Ban a user by ID"),
        )?;

        registrar.command(
            admin_command("kick", Handler::from_async(kick))
                .param(ParamSpec::required("user", ParamType::Mention))
                .describe("Remove a mentioned user, they may rejoin"),
        )?;

        registrar.command(
            admin_command("mute", Handler::from_async(mute))
                .param(ParamSpec::required("user_id", ParamType::Int))
                .option(
                    OptionSpec::value("minutes", ParamType::Int)
                        .short('m')
                        .default(10i64)
                        .describe("Mute duration"),
                )
                .describe("Mute a user for a while"),
        )?;

        Ok(())
    }

    fn context(&self) -> Option<PluginContext> {
        Some(Arc::new(ModerationContext { bot: self.bot.clone() }))
    }
}

fn admin_command(path: &str, handler: Handler) -> CommandSpec {
    CommandSpec::new(path, handler)
        .filter(Filter::group_only())
        .filter(Filter::admin_only())
}

fn bot_of(inv: &Invocation) -> anyhow::Result<ThrottledBot> {
    Ok(inv
        .plugin_state::<ModerationContext>()
        .context("moderation context missing")?
        .bot
        .clone())
}

fn user_id_arg(inv: &Invocation) -> anyhow::Result<UserId> {
    let id = match inv.arg(0) {
        Some(Value::Int(id)) => u64::try_from(*id).context("user ID must be positive")?,
        Some(Value::Mention(id)) => *id,
        _ => anyhow::bail!("missing target user"),
    };
    Ok(UserId(id))
}

async fn ban(inv: Invocation) -> anyhow::Result<()> {
    let bot = bot_of(&inv)?;
    let user_id = user_id_arg(&inv)?;
    let chat_id = ChatId(inv.event.chat_id());

    bot.ban_chat_member(chat_id, user_id).await?;

    let text = match inv.arg(1).and_then(Value::as_str) {
        Some(reason) => format!("Banned {user_id}. Reason: {reason}"),
        None => format!("Banned {user_id}."),
    };
    inv.reply(text).await
}

async fn kick(inv: Invocation) -> anyhow::Result<()> {
    let bot = bot_of(&inv)?;
    let user_id = user_id_arg(&inv)?;
    let chat_id = ChatId(inv.event.chat_id());

    // Ban then unban = kick
    bot.ban_chat_member(chat_id, user_id).await?;
    bot.unban_chat_member(chat_id, user_id).await?;

    inv.reply(format!("Kicked {user_id}.")).await
}

async fn mute(inv: Invocation) -> anyhow::Result<()> {
    let bot = bot_of(&inv)?;
    let user_id = user_id_arg(&inv)?;
    let chat_id = ChatId(inv.event.chat_id());

    let minutes = inv.named("minutes").and_then(Value::as_int).unwrap_or(10);
    if minutes <= 0 {
        anyhow::bail!("mute duration must be positive");
    }
    let until = Utc::now() + Duration::minutes(minutes);

    // No rights = Muted
    bot.restrict_chat_member(chat_id, user_id, ChatPermissions::empty())
        .until_date(until)
        .await?;

    inv.reply(format!("Muted {user_id} for {minutes} minutes.")).await
}
