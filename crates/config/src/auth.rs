//! API key cache configuration

use serde::Deserialize;
use std::time::Duration;

/// Auth configuration
///
/// The cache never expires entries on its own. The janitor purges
/// `purge_batch_size` least recently used keys per pass while the cache
/// holds more than `cache_capacity` records.
///
/// ```toml
/// [auth]
/// cache_capacity = 10000
/// purge_batch_size = 10
/// purge_interval = "30s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Soft upper bound on cached key records
    pub cache_capacity: usize,

    /// Entries removed per purge
    pub purge_batch_size: usize,

    /// How often the janitor checks the cache size
    #[serde(with = "humantime_serde")]
    pub purge_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            purge_batch_size: 10,
            purge_interval: Duration::from_secs(30),
        }
    }
}
