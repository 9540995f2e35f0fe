//! Notification sink that answers the sender.

use tracing::warn;

use herald::{LogSink, Notification, NotificationKind, NotificationSink};

/// Logs every notification and tells the sender when their arguments
/// did not bind.
#[derive(Debug, Default)]
pub struct ReplySink {
    log: LogSink,
}

impl NotificationSink for ReplySink {
    fn publish(&self, notification: Notification) {
        if notification.kind == NotificationKind::BindFailed {
            let event = notification.event.clone();
            let text = match &notification.command_name {
                Some(name) => format!("{name}: {}", notification.message),
                None => notification.message.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = event.reply(text).await {
                    warn!("Failed to report bind error to chat {}: {}", event.chat_id(), e);
                }
            });
        }
        self.log.publish(notification);
    }
}
