//! In-memory credential store
//!
//! Used by tests and ephemeral deployments. All state lives behind a single
//! `RwLock`, so every batch operation is atomic with respect to readers.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::Result;
use crate::model::{ApiKeyRecord, TenantRecord, UsageCounter, UsageLimit};
use crate::store::CredentialStore;

type CounterKey = (String, String, DateTime<Utc>);

#[derive(Debug, Default)]
struct MemoryInner {
    tenants: BTreeMap<String, TenantRecord>,
    keys: HashMap<String, ApiKeyRecord>,
    counters: BTreeMap<CounterKey, i64>,
}

/// Credential store held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored counters
    pub fn counter_count(&self) -> usize {
        self.inner.read().counters.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        Ok(self.inner.read().tenants.values().cloned().collect())
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>> {
        Ok(self.inner.read().tenants.get(tenant_id).cloned())
    }

    async fn upsert_tenants(&self, tenants: &[TenantRecord]) -> Result<()> {
        let mut inner = self.inner.write();
        for tenant in tenants {
            inner
                .tenants
                .insert(tenant.tenant_id.clone(), tenant.clone());
        }
        Ok(())
    }

    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>> {
        Ok(self.inner.read().keys.get(key).cloned())
    }

    async fn get_api_key_by_report_id(&self, report_id: &str) -> Result<Option<ApiKeyRecord>> {
        Ok(self
            .inner
            .read()
            .keys
            .values()
            .find(|k| k.report_id.as_deref() == Some(report_id))
            .cloned())
    }

    async fn list_api_keys_for_tenant(&self, tenant_id: &str) -> Result<Vec<ApiKeyRecord>> {
        let mut keys: Vec<ApiKeyRecord> = self
            .inner
            .read()
            .keys
            .values()
            .filter(|k| k.tenant_id.as_deref() == Some(tenant_id))
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(keys)
    }

    async fn has_api_keys(&self) -> Result<bool> {
        Ok(!self.inner.read().keys.is_empty())
    }

    async fn upsert_api_keys(&self, keys: &[ApiKeyRecord]) -> Result<()> {
        let mut inner = self.inner.write();
        for key in keys {
            inner.keys.insert(key.key.clone(), key.clone());
        }
        Ok(())
    }

    async fn upsert_usage_limit(&self, key: &str, limit: &UsageLimit) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(record) = inner.keys.get_mut(key) {
            *record.limit_entry(&limit.resource) = limit.clone();
        }
        Ok(())
    }

    async fn delete_api_key(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        let existed = inner.keys.remove(key).is_some();
        inner.counters.retain(|(k, _, _), _| k != key);
        Ok(existed)
    }

    async fn latest_counter(
        &self,
        api_key_id: &str,
        resource: &str,
    ) -> Result<Option<UsageCounter>> {
        Ok(self
            .inner
            .read()
            .counters
            .iter()
            .filter(|((k, r, _), _)| k == api_key_id && r == resource)
            .max_by_key(|((_, _, start), _)| *start)
            .map(|((k, r, start), count)| UsageCounter {
                api_key_id: k.clone(),
                resource: r.clone(),
                period_start: *start,
                count: *count,
            }))
    }

    async fn counters_in_range(
        &self,
        api_key_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageCounter>> {
        let mut counters: Vec<UsageCounter> = self
            .inner
            .read()
            .counters
            .iter()
            .filter(|((k, _, s), _)| k == api_key_id && *s >= start && *s <= end)
            .map(|((k, r, s), count)| UsageCounter {
                api_key_id: k.clone(),
                resource: r.clone(),
                period_start: *s,
                count: *count,
            })
            .collect();
        counters.sort_by(|a, b| {
            a.period_start
                .cmp(&b.period_start)
                .then_with(|| a.resource.cmp(&b.resource))
        });
        Ok(counters)
    }

    async fn upsert_counters(&self, counters: &[UsageCounter]) -> Result<()> {
        let mut inner = self.inner.write();
        for c in counters {
            inner.counters.insert(
                (c.api_key_id.clone(), c.resource.clone(), c.period_start),
                c.count,
            );
        }
        Ok(())
    }

    async fn reassign_counters(&self, from_key: &str, to_key: &str) -> Result<u64> {
        let mut inner = self.inner.write();
        let moved: Vec<(CounterKey, i64)> = inner
            .counters
            .iter()
            .filter(|((k, _, _), _)| k == from_key)
            .map(|(key, count)| (key.clone(), *count))
            .collect();

        for ((_, resource, start), count) in &moved {
            inner.counters.remove(&(from_key.to_string(), resource.clone(), *start));
            *inner
                .counters
                .entry((to_key.to_string(), resource.clone(), *start))
                .or_default() += count;
        }
        Ok(moved.len() as u64)
    }
}
