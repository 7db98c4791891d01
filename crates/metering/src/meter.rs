//! Usage reporting entry point for request paths

use std::sync::Arc;

use tollgate_auth::ApiKeyCache;
use tracing::{debug, warn};

use crate::event::{UsageEvent, UsageQueue};

/// Records usage for live quotas and queues it for consolidation
#[derive(Clone)]
pub struct UsageMeter {
    cache: Arc<ApiKeyCache>,
    queue: UsageQueue,
}

impl UsageMeter {
    /// Create a meter feeding `queue`
    pub fn new(cache: Arc<ApiKeyCache>, queue: UsageQueue) -> Self {
        Self { cache, queue }
    }

    /// Report usage
    ///
    /// Updates the key's live quota counter, then queues the event without
    /// waiting. Invalid events are ignored. A failed quota update is logged
    /// and does not stop the event from being queued. Returns whether the
    /// event was queued.
    pub async fn report(&self, event: UsageEvent) -> bool {
        if !event.is_valid() {
            debug!(
                report_id = %event.report_id,
                resource = %event.resource,
                count = event.count,
                "ignoring invalid usage report"
            );
            return false;
        }

        match self
            .cache
            .record_usage(&event.report_id, &event.resource, event.count)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(report_id = %event.report_id, "usage reported for unknown key");
            }
            Err(e) => {
                warn!(report_id = %event.report_id, error = %e, "live quota update failed");
            }
        }

        let queued = self.queue.send(event);
        if !queued {
            warn!("usage queue closed, report discarded");
        }
        queued
    }

    /// Whether the consolidation worker is still running
    pub fn is_active(&self) -> bool {
        self.queue.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_store::{ApiKeyRecord, CredentialStore, MemoryStore, UsageLimit};

    async fn meter() -> (
        UsageMeter,
        Arc<ApiKeyCache>,
        tokio::sync::mpsc::UnboundedReceiver<UsageEvent>,
    ) {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_api_keys(&[ApiKeyRecord::new("k1")
                .with_report_id("r1")
                .with_limit(UsageLimit::new("ocr", 100))])
            .await
            .unwrap();
        let cache = Arc::new(ApiKeyCache::new(store));
        let (queue, receiver) = UsageQueue::channel();
        (UsageMeter::new(Arc::clone(&cache), queue), cache, receiver)
    }

    #[tokio::test]
    async fn test_report_updates_live_quota_and_queues() {
        let (meter, cache, mut receiver) = meter().await;

        assert!(meter.report(UsageEvent::new("r1", "ocr", 5)).await);
        assert!(meter.report(UsageEvent::new("r1", "ocr", 3)).await);

        let record = cache.cached("k1").unwrap();
        assert_eq!(record.limit("ocr").unwrap().current, 8);
        assert_eq!(receiver.try_recv().unwrap().count, 5);
        assert_eq!(receiver.try_recv().unwrap().count, 3);
    }

    #[tokio::test]
    async fn test_invalid_report_ignored() {
        let (meter, cache, mut receiver) = meter().await;

        assert!(!meter.report(UsageEvent::new("r1", "ocr", 0)).await);
        assert!(!meter.report(UsageEvent::new("", "ocr", 2)).await);
        assert!(receiver.try_recv().is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_report_id_still_queued() {
        let (meter, _, mut receiver) = meter().await;
        assert!(meter.report(UsageEvent::new("ghost", "ocr", 1)).await);
        assert_eq!(receiver.try_recv().unwrap().report_id, "ghost");
    }

    #[tokio::test]
    async fn test_closed_queue_reports_false() {
        let (meter, _, receiver) = meter().await;
        drop(receiver);
        assert!(!meter.is_active());
        assert!(!meter.report(UsageEvent::new("r1", "ocr", 1)).await);
    }
}
