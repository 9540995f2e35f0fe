//! Notifications published when a dispatch fails after resolution.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::event::SharedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Arguments did not fit the command's parameters.
    BindFailed,
    /// The handler returned an error or panicked.
    ExecutionFailed,
}

/// A failure record handed to the [`NotificationSink`].
#[derive(Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub event: SharedEvent,
    /// Human-readable description, safe to show to the sender.
    pub message: String,
    /// Resolved command or handler name.
    pub command_name: Option<String>,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, event: SharedEvent, message: impl Into<String>, command_name: Option<String>) -> Self {
        Self {
            kind,
            event,
            message: message.into(),
            command_name,
            at: Utc::now(),
        }
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("kind", &self.kind)
            .field("chat_id", &self.event.chat_id())
            .field("message", &self.message)
            .field("command_name", &self.command_name)
            .field("at", &self.at)
            .finish()
    }
}

/// Receives dispatch failures. Must not block.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, n: Notification) {
        let command = n.command_name.as_deref().unwrap_or("-");
        match n.kind {
            NotificationKind::BindFailed => warn!(
                chat_id = n.event.chat_id(),
                sender_id = n.event.sender_id(),
                command,
                "Bind failed: {}",
                n.message
            ),
            NotificationKind::ExecutionFailed => error!(
                chat_id = n.event.chat_id(),
                sender_id = n.event.sender_id(),
                command,
                "Handler failed: {}",
                n.message
            ),
        }
    }
}

/// Forwards notifications into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn publish(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("Notification receiver dropped");
        }
    }
}
