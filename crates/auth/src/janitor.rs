//! Background cache eviction
//!
//! Keeps the API key cache near its configured capacity by purging the
//! least recently used batch on every tick until it fits.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::ApiKeyCache;

/// Periodic purge task for an `ApiKeyCache`
pub struct CacheJanitor {
    cache: Arc<ApiKeyCache>,
    capacity: usize,
    interval: Duration,
    cancel: CancellationToken,
}

impl CacheJanitor {
    /// Create a janitor that trims `cache` to `capacity` every `interval`
    pub fn new(
        cache: Arc<ApiKeyCache>,
        capacity: usize,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cache,
            capacity,
            interval,
            cancel,
        }
    }

    /// Purge until the cache fits its capacity
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        while self.cache.len() > self.capacity {
            let purged = self.cache.purge();
            if purged == 0 {
                break;
            }
            removed += purged;
        }
        removed
    }

    /// Run until cancelled
    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            capacity = self.capacity,
            interval_secs = self.interval.as_secs(),
            "api key cache janitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        debug!(removed, size = self.cache.len(), "api key cache trimmed");
                    }
                }
                _ = self.cancel.cancelled() => break,
            }
        }

        info!("api key cache janitor stopped");
    }
}
