//! Role checker with caching.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMember, ChatMemberKind, UserId};
use tracing::{debug, warn};

use herald::Role;
use herald::cache::{CacheConfig, TypedCache};

/// Cache key for role lookups.
type RoleCacheKey = (i64, u64); // (chat_id, user_id)

/// Role checker with caching support.
///
/// Bot owners (from OWNER_IDS env) resolve to [`Role::Owner`] in every chat.
#[derive(Clone)]
pub struct Permissions {
    bot: Bot,
    cache: TypedCache<RoleCacheKey, Role>,
    /// Bot owner IDs - these users pass every role check.
    owner_ids: Vec<u64>,
}

impl Permissions {
    pub fn with_owners(bot: Bot, owner_ids: Vec<u64>) -> Self {
        let cache = TypedCache::new(
            "member_roles",
            CacheConfig::hot_promoted().ttl(Duration::from_secs(300)), // 5 minutes
        );

        Self { bot, cache, owner_ids }
    }

    #[inline]
    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id.0)
    }

    /// Role of `user_id` in `chat_id`.
    ///
    /// Private chats have no admins. API failures resolve to
    /// [`Role::Member`] and are not cached.
    pub async fn role_of(&self, chat_id: ChatId, user_id: UserId) -> Role {
        if self.is_bot_owner(user_id) {
            return Role::Owner;
        }
        if chat_id.is_user() {
            return Role::Member;
        }

        let cache_key = (chat_id.0, user_id.0);
        if let Some(role) = self.cache.get(&cache_key) {
            debug!("Role cache hit for user {} in chat {}", user_id, chat_id);
            return role;
        }

        match self.bot.get_chat_member(chat_id, user_id).await {
            Ok(member) => {
                let role = role_from_member(&member);
                self.cache.insert(cache_key, role);
                role
            }
            Err(e) => {
                warn!("Failed to fetch member {} of chat {}: {}", user_id, chat_id, e);
                Role::Member
            }
        }
    }

    /// Forget a cached role, e.g. after a promotion.
    pub fn invalidate(&self, chat_id: ChatId, user_id: UserId) {
        self.cache.invalidate(&(chat_id.0, user_id.0));
    }
}

fn role_from_member(member: &ChatMember) -> Role {
    match &member.kind {
        ChatMemberKind::Owner(_) => Role::Owner,
        ChatMemberKind::Administrator(_) => Role::Admin,
        _ => Role::Member,
    }
}
