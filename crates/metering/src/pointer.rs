//! Memoized "current counter" lookups
//!
//! Saves a store round-trip per flushed key. Entries expire after `ttl`
//! without use; a hit does not imply the counter is still in the current
//! period, so callers re-check rollover before trusting it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tollgate_store::UsageCounter;

/// Idle longer than `ttl`; a clock that went backwards never expires
fn expired(last_used: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    (now - last_used).to_std().is_ok_and(|idle| idle > ttl)
}

/// Sliding-expiry map from `(api_key_id, resource)` to the last counter
/// written for it
#[derive(Debug)]
pub struct PointerCache {
    ttl: Duration,
    entries: HashMap<(String, String), (UsageCounter, DateTime<Utc>)>,
}

impl PointerCache {
    /// Create an empty cache
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Look up a counter, refreshing its expiry
    pub fn get(&mut self, api_key_id: &str, resource: &str, now: DateTime<Utc>) -> Option<UsageCounter> {
        let id = (api_key_id.to_string(), resource.to_string());
        let last_used = self.entries.get(&id)?.1;

        if expired(last_used, now, self.ttl) {
            self.entries.remove(&id);
            return None;
        }

        let entry = self.entries.get_mut(&id)?;
        entry.1 = now;
        Some(entry.0.clone())
    }

    /// Remember the latest state of a counter
    pub fn insert(&mut self, counter: UsageCounter, now: DateTime<Utc>) {
        let id = (counter.api_key_id.clone(), counter.resource.clone());
        self.entries.insert(id, (counter, now));
    }

    /// Forget a counter
    pub fn invalidate(&mut self, api_key_id: &str, resource: &str) {
        self.entries
            .remove(&(api_key_id.to_string(), resource.to_string()));
    }

    /// Drop every expired entry, returning how many went
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, (_, last_used)| !expired(*last_used, now, ttl));
        before - self.entries.len()
    }

    /// Number of cached pointers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn counter(key: &str, count: i64) -> UsageCounter {
        UsageCounter {
            api_key_id: key.into(),
            resource: "ocr".into(),
            period_start: Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap(),
            count,
        }
    }

    #[test]
    fn test_hit_slides_expiry() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let mut cache = PointerCache::new(Duration::from_secs(300));
        cache.insert(counter("k1", 4), t0);

        let t1 = t0 + chrono::Duration::seconds(240);
        assert_eq!(cache.get("k1", "ocr", t1).map(|c| c.count), Some(4));

        let t2 = t1 + chrono::Duration::seconds(240);
        assert!(cache.get("k1", "ocr", t2).is_some());
    }

    #[test]
    fn test_idle_entry_expires() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let mut cache = PointerCache::new(Duration::from_secs(300));
        cache.insert(counter("k1", 4), t0);
        cache.insert(counter("k2", 1), t0 + chrono::Duration::seconds(200));

        let later = t0 + chrono::Duration::seconds(301);
        assert!(cache.get("k1", "ocr", later).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep(t0 + chrono::Duration::seconds(600)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let mut cache = PointerCache::new(Duration::from_secs(300));
        cache.insert(counter("k1", 4), t0);
        cache.invalidate("k1", "ocr");
        assert!(cache.get("k1", "ocr", t0).is_none());
    }
}
