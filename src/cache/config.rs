//! Cache configuration.
//!
//! Controls the posts-page cache via the `[cache]` table of `vicky.toml`.

use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 10 * 60 * 60;

/// Resolved cache configuration handed to each cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a fetched page stays fresh.
    pub ttl: Duration,
    /// Serialize concurrent misses for the same key behind one fetch.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            single_flight: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: settings.ttl,
            single_flight: settings.single_flight,
        }
    }
}
