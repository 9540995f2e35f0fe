//! Permission system for resolving sender roles.
//!
//! The engine's filters are synchronous, so the sender's role is resolved
//! here, before an update becomes an engine event.
//!
//! ## Features
//!
//! - Cached member lookups (reduces API hits)
//! - Bot owners (`OWNER_IDS`) are owners everywhere
//!
//! ## Usage
//!
//! ```ignore
//! let perms = Permissions::with_owners(bot.inner().clone(), owner_ids);
//! let role = perms.role_of(msg.chat.id, user.id).await;
//! ```

mod checker;

pub use checker::Permissions;
