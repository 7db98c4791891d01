//! Usage metering configuration

use serde::Deserialize;
use std::time::Duration;

/// Calendar granularity of persisted usage counters
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CounterPeriod {
    /// One counter per UTC day (default)
    #[default]
    Daily,
    /// One counter per ISO week
    Weekly,
    /// One counter per calendar month
    Monthly,
}

/// Metering configuration
///
/// ```toml
/// [metering]
/// flush_interval = "5m"
/// period = "weekly"
/// pointer_ttl = "5m"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// Time between consolidation flushes
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Counter granularity
    pub period: CounterPeriod,

    /// Sliding expiry of memoized counter lookups
    #[serde(with = "humantime_serde")]
    pub pointer_ttl: Duration,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(300),
            period: CounterPeriod::Daily,
            pointer_ttl: Duration::from_secs(300),
        }
    }
}
