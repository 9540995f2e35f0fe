//! Cache module - Caching built on Moka.
//!
//! ## Architecture
//!
//! - `CacheConfig` - Capacity and expiry settings with presets
//! - `TypedCache` - Named, cheaply cloneable wrapper over `moka::sync::Cache`
//!
//! The dispatcher memoizes plugin contexts in a `TypedCache`; the bot binary
//! caches resolved member roles the same way.
//!
//! ## Usage
//!
//! ```ignore
//! let roles: TypedCache<(i64, u64), Role> = TypedCache::new("roles", CacheConfig::hot_promoted());
//! roles.insert((chat_id, user_id), Role::Admin);
//! let role = roles.get(&(chat_id, user_id));
//! ```

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
