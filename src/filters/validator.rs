//! Filter validation.

use tracing::debug;

use super::{Filter, HandlerMeta};
use crate::event::BotEvent;

/// Logical AND of all filters, stopping at the first rejection.
pub fn validate_filters(meta: &HandlerMeta, filters: &[Filter], event: &dyn BotEvent) -> bool {
    for filter in filters {
        if !filter.check(meta, event) {
            debug!(
                "Filter '{}' rejected handler '{}' for chat {}",
                filter.name(),
                meta.name,
                event.chat_id()
            );
            return false;
        }
    }
    true
}
