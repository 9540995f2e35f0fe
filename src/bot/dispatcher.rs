//! Update dispatcher setup.
//!
//! Every message and chat member update is turned into a [`TelegramEvent`]
//! and handed to the command engine.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::ChatMemberUpdated;
use tracing::error;

use herald::{CommandDispatcher, SharedEvent};

use super::event::TelegramEvent;
use crate::permissions::Permissions;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Command resolution and dispatch engine.
    pub engine: Arc<CommandDispatcher>,

    /// Role checker with member caching.
    pub permissions: Permissions,
}

impl AppState {
    pub fn new(bot: &ThrottledBot, engine: Arc<CommandDispatcher>, owner_ids: Vec<u64>) -> Self {
        // Permissions needs the inner Bot for API calls
        let permissions = Permissions::with_owners(bot.inner().clone(), owner_ids);
        Self { engine, permissions }
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_chat_member().endpoint(on_member_update))
}

async fn on_message(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }

    let role = state.permissions.role_of(msg.chat.id, user.id).await;
    let event: SharedEvent = Arc::new(TelegramEvent::from_message(bot, &msg, role));
    dispatch(&state, event).await;
    Ok(())
}

async fn on_member_update(bot: ThrottledBot, update: ChatMemberUpdated, state: AppState) -> anyhow::Result<()> {
    state
        .permissions
        .invalidate(update.chat.id, update.new_chat_member.user.id);

    if let Some(event) = TelegramEvent::from_member_update(bot, &update) {
        dispatch(&state, Arc::new(event)).await;
    }
    Ok(())
}

/// Index build errors are configuration bugs; log them and keep polling.
async fn dispatch(state: &AppState, event: SharedEvent) {
    if let Err(e) = state.engine.handle_event(event).await {
        error!("Command index is broken, commands are disabled: {}", e);
    }
}
