//! Stats plugin: counts messages per chat.
//!
//! A pure filter handler sees every message; /stats reports the count for
//! the current chat.

use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;

use herald::command::PluginContext;
use herald::{CommandSpec, Filter, FilterHandler, Handler, Invocation, Plugin, PluginError, PluginRegistrar};

#[derive(Default)]
pub struct StatsPlugin {
    counters: Arc<MessageCounters>,
}

#[derive(Debug, Default)]
struct MessageCounters {
    per_chat: DashMap<i64, u64>,
}

impl MessageCounters {
    fn record(&self, chat_id: i64) {
        *self.per_chat.entry(chat_id).or_insert(0) += 1;
    }

    fn count(&self, chat_id: i64) -> u64 {
        self.per_chat.get(&chat_id).map_or(0, |c| *c)
    }
}

impl Plugin for StatsPlugin {
    fn name(&self) -> &str {
        "stats"
    }

    fn register(&self, registrar: &PluginRegistrar<'_>) -> Result<(), PluginError> {
        registrar.filter(
            FilterHandler::new("count_messages", Handler::from_async(count_message)).filter(Filter::group_only()),
        );
        registrar.command(
            CommandSpec::new("stats", Handler::from_async(stats))
                .filter(Filter::group_only())
                .describe("Messages seen in this chat"),
        )?;
        Ok(())
    }

    fn context(&self) -> Option<PluginContext> {
        Some(Arc::clone(&self.counters) as PluginContext)
    }
}

fn counters(inv: &Invocation) -> anyhow::Result<&MessageCounters> {
    inv.plugin_state::<MessageCounters>().context("stats context missing")
}

async fn count_message(inv: Invocation) -> anyhow::Result<()> {
    counters(&inv)?.record(inv.event.chat_id());
    Ok(())
}

async fn stats(inv: Invocation) -> anyhow::Result<()> {
    let count = counters(&inv)?.count(inv.event.chat_id());
    inv.reply(format!("Messages seen here: {count}")).await
}
