//! Event abstraction consumed by the engine.
//!
//! The transport layer parses its wire protocol into something implementing
//! [`BotEvent`]; the engine only reads segments and sender metadata, and
//! hands the event to handlers so they can reply.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Plain text.
    Text(String),
    /// A mention of a user by ID.
    Mention(u64),
    /// Any other content (photo, sticker, ...), labelled by kind.
    Other(String),
}

/// Category discriminator of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostType {
    Message,
    MessageSent,
    Notice,
    Request,
}

impl PostType {
    /// Whether this event goes through command resolution.
    pub fn is_message(self) -> bool {
        matches!(self, Self::Message | Self::MessageSent)
    }
}

/// Where the event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Group,
    Private,
}

/// Sender role, resolved by the transport before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Role {
    #[default]
    Member,
    Admin,
    Owner,
}

/// An inbound event as seen by the engine.
pub trait BotEvent: Send + Sync + fmt::Debug {
    /// Ordered message content. Empty for non-message events.
    fn segments(&self) -> &[Segment];

    fn post_type(&self) -> PostType {
        PostType::Message
    }

    fn chat_kind(&self) -> ChatKind;

    fn chat_id(&self) -> i64;

    fn sender_id(&self) -> u64;

    fn sender_role(&self) -> Role {
        Role::Member
    }

    /// Send a text reply to wherever the event came from.
    fn reply(&self, text: String) -> BoxFuture<'_, anyhow::Result<()>>;

    /// The first segment, if it is text.
    fn first_text(&self) -> Option<&str> {
        match self.segments().first() {
            Some(Segment::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// Events are shared between the dispatch path and handler tasks.
pub type SharedEvent = Arc<dyn BotEvent>;
