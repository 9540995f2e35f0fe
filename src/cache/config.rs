//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Entries are evicted this long after insertion.
    pub ttl: Option<Duration>,

    /// Entries are evicted if not accessed within this duration.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)), // 5 minutes
            tti: None,
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Entries never expire based on time.
    #[must_use]
    pub fn no_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Plugin contexts: few entries, purged explicitly on lifecycle changes.
    pub fn plugin_contexts() -> Self {
        Self {
            max_capacity: 256,
            ttl: None,
            tti: Some(Duration::from_secs(3600)), // 1 hour idle
        }
    }

    /// Member roles: checked on every command, stale after a couple of minutes.
    pub fn hot_promoted() -> Self {
        Self {
            max_capacity: 5_000,
            ttl: Some(Duration::from_secs(120)), // 2 minutes max
            tti: Some(Duration::from_secs(60)),  // 1 minute idle
        }
    }
}
