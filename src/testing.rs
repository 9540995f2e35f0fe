//! In-memory event used by unit tests.

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::event::{BotEvent, ChatKind, PostType, Role, Segment};

#[derive(Debug)]
pub struct TestEvent {
    segments: Vec<Segment>,
    chat_kind: ChatKind,
    chat_id: i64,
    sender_id: u64,
    role: Role,
    post_type: PostType,
    replies: Mutex<Vec<String>>,
}

impl TestEvent {
    fn new(text: &str, chat_kind: ChatKind, chat_id: i64) -> Self {
        Self {
            segments: vec![Segment::Text(text.to_string())],
            chat_kind,
            chat_id,
            sender_id: 1000,
            role: Role::Member,
            post_type: PostType::Message,
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn private(text: &str) -> Self {
        Self::new(text, ChatKind::Private, 1000)
    }

    pub fn group(text: &str) -> Self {
        Self::new(text, ChatKind::Group, -100_500)
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_sender(mut self, sender_id: u64) -> Self {
        self.sender_id = sender_id;
        self
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_post_type(mut self, post_type: PostType) -> Self {
        self.post_type = post_type;
        self
    }

    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().clone()
    }
}

impl BotEvent for TestEvent {
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
        self.chat_id
    }

    fn sender_id(&self) -> u64 {
        self.sender_id
    }

    fn sender_role(&self) -> Role {
        self.role
    }

    fn reply(&self, text: String) -> BoxFuture<'_, anyhow::Result<()>> {
        self.replies.lock().push(text);
        Box::pin(async { Ok(()) })
    }
}
