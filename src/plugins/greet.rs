//! Greet plugin: welcomes members joining a group.

use herald::{BotEvent, EventHandler, Filter, Handler, Invocation, Plugin, PluginError, PluginRegistrar, PostType, Segment};

use crate::bot::event::MEMBER_JOINED;

pub struct GreetPlugin;

impl Plugin for GreetPlugin {
    fn name(&self) -> &str {
        "greet"
    }

    fn register(&self, registrar: &PluginRegistrar<'_>) -> Result<(), PluginError> {
        registrar.event(
            EventHandler::new("welcome", PostType::Notice, Handler::from_async(welcome))
                .filter(Filter::group_only())
                .filter(Filter::new("member_joined", |_, event| is_join(event))),
        );
        Ok(())
    }
}

fn is_join(event: &dyn BotEvent) -> bool {
    matches!(event.segments().first(), Some(Segment::Other(kind)) if kind == MEMBER_JOINED)
}

async fn welcome(inv: Invocation) -> anyhow::Result<()> {
    inv.reply("Welcome to the group! Send /help to see what I can do.").await
}
