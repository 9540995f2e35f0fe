//! Telegram updates as engine events.

use futures::future::BoxFuture;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberUpdated, MessageEntityKind, MessageId, ReplyParameters};

use herald::{BotEvent, ChatKind, PostType, Role, Segment};

use super::dispatcher::ThrottledBot;

/// Marker segment leading a "member joined" notice.
pub const MEMBER_JOINED: &str = "member_joined";
/// Marker segment leading a "member left" notice.
pub const MEMBER_LEFT: &str = "member_left";

/// A Telegram message or chat member update, with the sender's role
/// already resolved.
pub struct TelegramEvent {
    bot: ThrottledBot,
    chat_id: ChatId,
    reply_to: Option<MessageId>,
    chat_kind: ChatKind,
    sender_id: u64,
    role: Role,
    post_type: PostType,
    segments: Vec<Segment>,
}

impl TelegramEvent {
    pub fn from_message(bot: ThrottledBot, msg: &Message, role: Role) -> Self {
        Self {
            bot,
            chat_id: msg.chat.id,
            reply_to: Some(msg.id),
            chat_kind: chat_kind(&msg.chat),
            sender_id: msg.from.as_ref().map_or(0, |u| u.id.0),
            role,
            post_type: PostType::Message,
            segments: message_segments(msg),
        }
    }

    /// A notice for a member joining or leaving. `None` for other member
    /// updates (promotions, restrictions, ...).
    pub fn from_member_update(bot: ThrottledBot, update: &ChatMemberUpdated) -> Option<Self> {
        let old = &update.old_chat_member;
        let new = &update.new_chat_member;

        let marker = match (old.is_present(), new.is_present()) {
            (false, true) => MEMBER_JOINED,
            (true, false) => MEMBER_LEFT,
            _ => return None,
        };

        Some(Self {
            bot,
            chat_id: update.chat.id,
            reply_to: None,
            chat_kind: chat_kind(&update.chat),
            sender_id: new.user.id.0,
            role: Role::Member,
            post_type: PostType::Notice,
            segments: vec![Segment::Other(marker.to_string()), Segment::Mention(new.user.id.0)],
        })
    }
}

impl std::fmt::Debug for TelegramEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramEvent")
            .field("chat_id", &self.chat_id)
            .field("sender_id", &self.sender_id)
            .field("post_type", &self.post_type)
            .field("segments", &self.segments)
            .finish()
    }
}

impl BotEvent for TelegramEvent {
    fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn post_type(&self) -> PostType {
        self.post_type
    }

    fn chat_kind(&self) -> ChatKind {
        self.chat_kind
    }

    fn chat_id(&self) -> i64 {
        self.chat_id.0
    }

    fn sender_id(&self) -> u64 {
        self.sender_id
    }

    fn sender_role(&self) -> Role {
        self.role
    }

    fn reply(&self, text: String) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let request = self.bot.send_message(self.chat_id, text);
            match self.reply_to {
                Some(id) => request.reply_parameters(ReplyParameters::new(id)).await?,
                None => request.await?,
            };
            Ok(())
        })
    }
}

fn chat_kind(chat: &teloxide::types::Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else {
        ChatKind::Group
    }
}

/// Split a message into text and mention segments.
///
/// Media messages start with an `Other` segment so their captions never
/// resolve as commands.
fn message_segments(msg: &Message) -> Vec<Segment> {
    let Some(text) = msg.text() else {
        let kind = if msg.photo().is_some() {
            "photo"
        } else if msg.sticker().is_some() {
            "sticker"
        } else if msg.document().is_some() {
            "document"
        } else if msg.video().is_some() {
            "video"
        } else {
            "other"
        };
        let mut segments = vec![Segment::Other(kind.to_string())];
        if let Some(caption) = msg.caption() {
            segments.push(Segment::Text(caption.to_string()));
        }
        return segments;
    };

    let mentions: Vec<(usize, usize, u64)> = msg
        .parse_entities()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entity| match entity.kind() {
            MessageEntityKind::TextMention { user } => Some((entity.start(), entity.end(), user.id.0)),
            _ => None,
        })
        .collect();

    split_mentions(text, &mentions)
}

/// Replace `(start, end, user)` byte ranges of `text` with mention segments.
fn split_mentions(text: &str, mentions: &[(usize, usize, u64)]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for &(start, end, user) in mentions {
        if start < cursor || end > text.len() {
            continue;
        }
        if start > cursor {
            segments.push(Segment::Text(text[cursor..start].to_string()));
        }
        segments.push(Segment::Mention(user));
        cursor = end;
    }
    if cursor < text.len() || segments.is_empty() {
        segments.push(Segment::Text(text[cursor..].to_string()));
    }

    segments
}
