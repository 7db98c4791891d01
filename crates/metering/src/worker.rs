//! Usage consolidation worker
//!
//! Single consumer of the ingestion queue. Events are summed per
//! `(report_id, resource)` in a map only this task touches, then written
//! as period counters on every flush.
//!
//! # Flush
//!
//! 1. Resolve each report id to its API key through the key cache
//! 2. Find the current counter: memoized pointer, else latest stored
//!    counter, else a fresh one at the start of the current period.
//!    Disabled keys always go to the store; a renew may have moved their
//!    counters to the replacement key
//! 3. Add the delta and upsert every touched counter in one batch
//!
//! A stale counter (its period has ended) is never added to; a new one is
//! opened instead. If the batch write fails, the deltas stay pending and
//! merge with later usage until a flush succeeds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tollgate_auth::ApiKeyCache;
use tollgate_store::{CredentialStore, UsageCounter};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::event::{UsageEvent, UsageQueue};
use crate::period::Period;
use crate::pointer::PointerCache;

#[cfg(test)]
#[path = "worker_test.rs"]
mod tests;

/// Default time between flushes
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(300);

/// Default sliding expiry of memoized counters
const DEFAULT_POINTER_TTL: Duration = Duration::from_secs(300);

/// Configuration for the consolidation worker
#[derive(Debug, Clone)]
pub struct MeteringSettings {
    /// Time between flushes
    pub flush_interval: Duration,

    /// Counter granularity
    pub period: Period,

    /// Sliding expiry of memoized counters
    pub pointer_ttl: Duration,
}

impl Default for MeteringSettings {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            period: Period::Daily,
            pointer_ttl: DEFAULT_POINTER_TTL,
        }
    }
}

/// Result of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Counters written
    pub counters: usize,
    /// Counters opened for a new period
    pub opened: usize,
    /// Deltas discarded because their report id matches no key
    pub dropped: usize,
}

/// Background worker that persists usage counters
pub struct ConsolidationWorker {
    receiver: mpsc::UnboundedReceiver<UsageEvent>,
    store: Arc<dyn CredentialStore>,
    cache: Arc<ApiKeyCache>,
    clock: Arc<dyn Clock>,
    settings: MeteringSettings,
    pending: HashMap<(String, String), i64>,
    pointers: PointerCache,
    cancel: CancellationToken,
}

impl ConsolidationWorker {
    /// Create a worker and the queue that feeds it
    ///
    /// The worker should be spawned as a tokio task; the queue goes to the
    /// request paths, usually wrapped in a `UsageMeter`.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<ApiKeyCache>,
        settings: MeteringSettings,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> (Self, UsageQueue) {
        let (queue, receiver) = UsageQueue::channel();
        let worker = Self {
            receiver,
            store,
            cache,
            clock,
            pointers: PointerCache::new(settings.pointer_ttl),
            settings,
            pending: HashMap::new(),
            cancel,
        };
        (worker, queue)
    }

    /// Add an event to the pending totals
    pub fn accumulate(&mut self, event: UsageEvent) {
        if !event.is_valid() {
            debug!(report_id = %event.report_id, resource = %event.resource, "ignoring invalid usage event");
            return;
        }
        *self
            .pending
            .entry((event.report_id, event.resource))
            .or_insert(0) += event.count;
    }

    /// Move every queued event into the pending totals
    ///
    /// Returns the number of events taken.
    pub fn drain(&mut self) -> usize {
        let mut taken = 0;
        while let Ok(event) = self.receiver.try_recv() {
            self.accumulate(event);
            taken += 1;
        }
        taken
    }

    /// Number of `(report_id, resource)` totals awaiting a flush
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending total for one report id and resource
    pub fn pending(&self, report_id: &str, resource: &str) -> Option<i64> {
        self.pending
            .get(&(report_id.to_string(), resource.to_string()))
            .copied()
    }

    /// Find the counter a delta for `(api_key_id, resource)` belongs to
    ///
    /// Disabled keys skip the memoized pointer. Renewing a key disables it
    /// and moves its counters away, so only the store knows what is left.
    async fn current_counter(
        &mut self,
        api_key_id: &str,
        resource: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<(UsageCounter, bool)> {
        let period = self.settings.period;

        if !enabled {
            self.pointers.invalidate(api_key_id, resource);
        } else if let Some(counter) = self.pointers.get(api_key_id, resource, now)
            && period.is_current(counter.period_start, now)
        {
            return Ok((counter, false));
        }

        if let Some(counter) = self.store.latest_counter(api_key_id, resource).await?
            && period.is_current(counter.period_start, now)
        {
            return Ok((counter, false));
        }

        let fresh = UsageCounter {
            api_key_id: api_key_id.to_string(),
            resource: resource.to_string(),
            period_start: period.start_of(now),
            count: 0,
        };
        Ok((fresh, true))
    }

    /// Persist pending totals
    ///
    /// On error nothing pending is lost: totals stay queued for the next
    /// flush and the memoized counters involved are forgotten.
    pub async fn flush(&mut self) -> Result<FlushStats> {
        let mut stats = FlushStats::default();
        if self.pending.is_empty() {
            return Ok(stats);
        }

        let now = self.clock.now();
        self.pointers.sweep(now);

        let deltas: Vec<((String, String), i64)> =
            self.pending.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let mut batch: HashMap<(String, String), UsageCounter> = HashMap::new();
        let mut flushed = Vec::with_capacity(deltas.len());

        for ((report_id, resource), delta) in deltas {
            let Some(record) = self.cache.resolve(&report_id).await? else {
                warn!(
                    report_id = %report_id,
                    resource = %resource,
                    count = delta,
                    "dropping usage for unknown report id"
                );
                self.pending.remove(&(report_id, resource));
                stats.dropped += 1;
                continue;
            };

            let id = (record.key.clone(), resource.clone());
            if let Some(counter) = batch.get_mut(&id) {
                counter.count += delta;
            } else {
                let (mut counter, opened) = self
                    .current_counter(&record.key, &resource, record.enabled, now)
                    .await?;
                if opened {
                    stats.opened += 1;
                }
                counter.count += delta;
                batch.insert(id, counter);
            }
            flushed.push((report_id, resource));
        }

        if batch.is_empty() {
            return Ok(stats);
        }

        let counters: Vec<UsageCounter> = batch.into_values().collect();
        if let Err(e) = self.store.upsert_counters(&counters).await {
            for counter in &counters {
                self.pointers
                    .invalidate(&counter.api_key_id, &counter.resource);
            }
            return Err(e.into());
        }

        for id in &flushed {
            self.pending.remove(id);
        }
        stats.counters = counters.len();
        for counter in counters {
            self.pointers.insert(counter, now);
        }

        Ok(stats)
    }

    async fn flush_logged(&mut self) {
        let pending = self.pending.len();
        match self.flush().await {
            Ok(stats) if stats.counters > 0 || stats.dropped > 0 => {
                info!(
                    counters = stats.counters,
                    opened = stats.opened,
                    dropped = stats.dropped,
                    "usage consolidated"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, pending, "usage flush failed, retrying next interval");
            }
        }
    }

    /// Run until cancelled or every queue handle is dropped
    ///
    /// Remaining events are drained and flushed before returning.
    pub async fn run(mut self) {
        let mut ticker = interval(self.settings.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            flush_interval_secs = self.settings.flush_interval.as_secs(),
            period = %self.settings.period,
            "usage consolidation worker started"
        );

        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => self.accumulate(event),
                    None => {
                        debug!("usage queue closed");
                        break;
                    }
                },

                _ = ticker.tick() => self.flush_logged().await,

                _ = self.cancel.cancelled() => {
                    info!("usage consolidation worker received shutdown signal");
                    break;
                }
            }
        }

        let drained = self.drain();
        if !self.pending.is_empty() {
            info!(
                drained,
                pending = self.pending.len(),
                "flushing remaining usage on shutdown"
            );
            self.flush_logged().await;
        }

        info!("usage consolidation worker stopped");
    }
}
