//! Read-through API key cache
//!
//! Resolves a credential (secret key or report id) to its `ApiKeyRecord`,
//! loading it from the credential store on first use. Three shared maps
//! back the cache:
//!
//! - `records`: primary key → record
//! - `by_report_id`: report id → primary key
//! - `last_access`: primary key → access sequence number
//!
//! Every mutation is a per-key atomic DashMap operation. Concurrent misses
//! for one key both load from the store, but only the first insert wins and
//! both callers return that winning record.
//!
//! Entries never expire. `purge` drops the least recently used batch; the
//! `CacheJanitor` calls it while the cache is over capacity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use http::HeaderMap;
use tollgate_store::{ApiKeyRecord, CredentialStore, UsageLimit};
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::AuthContext;
use crate::credential::{PresentedCredential, extract_credential};
use crate::error::Result;

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;

/// Default number of entries removed per purge
pub const DEFAULT_PURGE_BATCH_SIZE: usize = 10;

/// Why a presented credential was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Matches no key or report id, or could not be read
    UnknownCredential,
    /// Key exists but is disabled
    Disabled,
}

impl RejectReason {
    /// Message returned to the caller
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnknownCredential => "Invalid API Key provided.",
            Self::Disabled => "API Key is disabled.",
        }
    }
}

/// Result of authenticating a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No credential presented; the request passes through unauthenticated
    NoCredential,
    /// Credential resolved to an enabled key
    Authenticated(AuthContext),
    /// Credential presented but refused
    Rejected(RejectReason),
}

/// Thread-safe read-through cache of API key records
pub struct ApiKeyCache {
    store: Arc<dyn CredentialStore>,
    records: DashMap<String, ApiKeyRecord>,
    by_report_id: DashMap<String, String>,
    last_access: DashMap<String, u64>,
    access_seq: AtomicU64,
    purge_batch_size: usize,
}

impl ApiKeyCache {
    /// Create an empty cache over a store
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_purge_batch_size(store, DEFAULT_PURGE_BATCH_SIZE)
    }

    /// Create an empty cache with a custom purge batch size
    pub fn with_purge_batch_size(store: Arc<dyn CredentialStore>, purge_batch_size: usize) -> Self {
        Self {
            store,
            records: DashMap::new(),
            by_report_id: DashMap::new(),
            last_access: DashMap::new(),
            access_seq: AtomicU64::new(0),
            purge_batch_size: purge_batch_size.max(1),
        }
    }

    /// Number of cached records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether a primary key is cached
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Cached copy of a record, without touching the store or access order
    pub fn cached(&self, key: &str) -> Option<ApiKeyRecord> {
        self.records.get(key).map(|r| r.value().clone())
    }

    /// Primary key registered for a report id
    pub fn key_for_report_id(&self, report_id: &str) -> Option<String> {
        self.by_report_id.get(report_id).map(|k| k.value().clone())
    }

    /// Number of registered report ids
    pub fn report_id_count(&self) -> usize {
        self.by_report_id.len()
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a credential to its record, loading it on a miss
    ///
    /// The credential is tried as a primary key first, then as a report id.
    /// Returns `None` if neither matches.
    pub async fn resolve(&self, credential: &str) -> Result<Option<ApiKeyRecord>> {
        if let Some(record) = self.cached(credential) {
            self.touch(&record.key);
            return Ok(Some(record));
        }

        if let Some(key) = self.key_for_report_id(credential)
            && let Some(record) = self.cached(&key)
        {
            self.touch(&key);
            return Ok(Some(record));
        }

        let loaded = match self.store.get_api_key(credential).await? {
            Some(record) => Some(record),
            None => self.store.get_api_key_by_report_id(credential).await?,
        };

        let Some(loaded) = loaded else {
            return Ok(None);
        };

        let record = self.fill(loaded);
        debug!(report_id = ?record.report_id, "api key loaded into cache");
        Ok(Some(record))
    }

    /// Insert a loaded record unless another caller got there first
    fn fill(&self, loaded: ApiKeyRecord) -> ApiKeyRecord {
        self.merge(loaded, |_| {})
    }

    /// Apply `change` to the cached record, or cache `fallback` if absent
    ///
    /// `fallback` must already carry the change. The entry is registered
    /// under its report id and stamped as accessed before returning.
    fn merge(
        &self,
        fallback: ApiKeyRecord,
        change: impl FnOnce(&mut ApiKeyRecord),
    ) -> ApiKeyRecord {
        let record = self
            .records
            .entry(fallback.key.clone())
            .and_modify(change)
            .or_insert(fallback)
            .value()
            .clone();

        if let Some(report_id) = &record.report_id {
            self.by_report_id
                .entry(report_id.clone())
                .or_insert_with(|| record.key.clone());
        }
        self.touch(&record.key);

        record
    }

    fn touch(&self, key: &str) {
        let seq = self.access_seq.fetch_add(1, Ordering::Relaxed);
        self.last_access.insert(key.to_string(), seq);
    }

    /// Authenticate a request by its headers
    ///
    /// `NoCredential` when neither credential header carries a value.
    /// `Err` only when the store could not be consulted.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthOutcome> {
        match extract_credential(headers) {
            PresentedCredential::Missing => Ok(AuthOutcome::NoCredential),
            PresentedCredential::Unreadable => {
                Ok(AuthOutcome::Rejected(RejectReason::UnknownCredential))
            }
            PresentedCredential::Value(credential) => {
                self.authenticate_credential(credential).await
            }
        }
    }

    /// Authenticate an already extracted credential
    pub async fn authenticate_credential(&self, credential: &str) -> Result<AuthOutcome> {
        let outcome = match self.resolve(credential).await? {
            None => AuthOutcome::Rejected(RejectReason::UnknownCredential),
            Some(record) if !record.enabled => AuthOutcome::Rejected(RejectReason::Disabled),
            Some(record) => AuthOutcome::Authenticated(AuthContext::from_record(&record)),
        };
        Ok(outcome)
    }

    // =========================================================================
    // Administration (write-through)
    // =========================================================================

    /// Enable or disable a key
    ///
    /// Enabling resets every quota's `current` to 0. Disabling leaves
    /// quotas untouched. Returns the updated record, or `None` if the
    /// credential matches no key.
    ///
    /// A failed store write leaves the cached record unchanged.
    pub async fn enable_api_key(
        &self,
        credential: &str,
        enabled: bool,
    ) -> Result<Option<ApiKeyRecord>> {
        let Some(record) = self.resolve(credential).await? else {
            return Ok(None);
        };

        let change = |record: &mut ApiKeyRecord| {
            record.enabled = enabled;
            if enabled {
                for limit in record.limits.iter_mut() {
                    limit.current = 0;
                }
            }
        };

        let mut persisted = record;
        change(&mut persisted);
        self.store
            .upsert_api_keys(std::slice::from_ref(&persisted))
            .await?;
        let updated = self.merge(persisted, change);

        info!(report_id = ?updated.report_id, enabled, "api key state changed");
        Ok(Some(updated))
    }

    /// Re-enable a key and zero its quota usage
    pub async fn reset_api_key(&self, credential: &str) -> Result<Option<ApiKeyRecord>> {
        self.enable_api_key(credential, true).await
    }

    /// Replace a key with a freshly generated one
    ///
    /// The new key and report id inherit tenant, department, roles and
    /// quotas. Historical usage counters move to the new key. The old key
    /// stays in the store, disabled and without quotas.
    pub async fn renew_api_key(&self, credential: &str) -> Result<Option<ApiKeyRecord>> {
        let Some(old) = self.resolve(credential).await? else {
            return Ok(None);
        };

        let renewed = ApiKeyRecord {
            key: Uuid::new_v4().simple().to_string(),
            report_id: Some(Uuid::new_v4().simple().to_string()),
            tenant_id: old.tenant_id.clone(),
            department: old.department.clone(),
            enabled: true,
            roles: old.roles.clone(),
            limits: old.limits.clone(),
            created_at: Utc::now(),
        };

        let mut retired = old;
        retired.enabled = false;
        retired.limits.clear();

        self.store
            .upsert_api_keys(&[retired.clone(), renewed.clone()])
            .await?;
        let moved = self
            .store
            .reassign_counters(&retired.key, &renewed.key)
            .await?;

        let old_report_id = retired.report_id.clone();
        self.evict(&retired.key);
        self.fill(retired);

        info!(
            old_report_id = ?old_report_id,
            new_report_id = ?renewed.report_id,
            counters_moved = moved,
            "api key renewed"
        );
        Ok(Some(renewed))
    }

    /// Delete a key from the store and the cache
    ///
    /// Returns `false` if the store had no such key.
    pub async fn delete_api_key(&self, key: &str) -> Result<bool> {
        let deleted = self.store.delete_api_key(key).await?;
        self.evict(key);
        if deleted {
            info!("api key deleted");
        }
        Ok(deleted)
    }

    // =========================================================================
    // Live quota
    // =========================================================================

    /// Add usage to a key's live quota counter
    ///
    /// Creates an uncapped entry when the key has none for the resource.
    /// The store is written first; the cached record only changes once the
    /// write succeeded.
    /// Returns `None` if the report id matches no key.
    pub async fn record_usage(
        &self,
        report_id: &str,
        resource: &str,
        count: i64,
    ) -> Result<Option<UsageLimit>> {
        let Some(record) = self.resolve(report_id).await? else {
            return Ok(None);
        };
        let change = |record: &mut ApiKeyRecord| record.limit_entry(resource).current += count;

        let mut persisted = record;
        change(&mut persisted);
        if let Some(limit) = persisted.limit(resource) {
            self.store.upsert_usage_limit(&persisted.key, limit).await?;
        }

        let updated = self.merge(persisted, change);
        Ok(updated.limit(resource).cloned())
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Remove the least recently accessed batch of entries
    ///
    /// Returns the number of records removed.
    pub fn purge(&self) -> usize {
        // Records without an access stamp sort first
        let mut by_age: Vec<(String, u64)> = self
            .records
            .iter()
            .map(|e| {
                let seq = self.last_access.get(e.key()).map_or(0, |s| *s.value());
                (e.key().clone(), seq)
            })
            .collect();
        by_age.sort_unstable_by_key(|(_, seq)| *seq);

        let mut removed = 0;
        for (key, _) in by_age.into_iter().take(self.purge_batch_size) {
            if self.evict(&key) {
                removed += 1;
            }
        }

        debug!(removed, remaining = self.records.len(), "api key cache purged");
        removed
    }

    /// Drop one key from every map
    fn evict(&self, key: &str) -> bool {
        self.last_access.remove(key);
        match self.records.remove(key) {
            Some((_, record)) => {
                if let Some(report_id) = &record.report_id {
                    self.by_report_id.remove_if(report_id, |_, k| k == key);
                }
                true
            }
            None => false,
        }
    }
}
