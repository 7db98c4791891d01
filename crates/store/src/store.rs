//! Credential store trait
//!
//! Abstracts the persistence backend so the cache, reconciler and metering
//! worker can run against SQLite in production and memory in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{ApiKeyRecord, TenantRecord, UsageCounter, UsageLimit};

/// Persistence operations used by the control plane
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create tables and indexes if they don't exist
    async fn ensure_schema(&self) -> Result<()>;

    // =========================================================================
    // Tenants
    // =========================================================================

    /// All tenants, ordered by id
    async fn list_tenants(&self) -> Result<Vec<TenantRecord>>;

    /// Tenant by id
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>>;

    /// Insert or replace tenants
    async fn upsert_tenants(&self, tenants: &[TenantRecord]) -> Result<()>;

    // =========================================================================
    // API keys
    // =========================================================================

    /// Key by its secret value, limits included
    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>>;

    /// Key by its report id, limits included
    async fn get_api_key_by_report_id(&self, report_id: &str) -> Result<Option<ApiKeyRecord>>;

    /// Keys belonging to a tenant
    async fn list_api_keys_for_tenant(&self, tenant_id: &str) -> Result<Vec<ApiKeyRecord>>;

    /// Whether any key exists
    async fn has_api_keys(&self) -> Result<bool>;

    /// Insert or replace keys; each key's limits are replaced with it
    async fn upsert_api_keys(&self, keys: &[ApiKeyRecord]) -> Result<()>;

    /// Insert or replace a single quota entry of an existing key
    async fn upsert_usage_limit(&self, key: &str, limit: &UsageLimit) -> Result<()>;

    /// Delete a key with its limits and counters
    ///
    /// Returns `false` if the key did not exist.
    async fn delete_api_key(&self, key: &str) -> Result<bool>;

    // =========================================================================
    // Usage counters
    // =========================================================================

    /// Most recent counter for a key and resource
    async fn latest_counter(&self, api_key_id: &str, resource: &str)
    -> Result<Option<UsageCounter>>;

    /// Counters of a key whose period starts within `[start, end]`,
    /// ordered by period start
    async fn counters_in_range(
        &self,
        api_key_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageCounter>>;

    /// Insert or replace counters atomically
    async fn upsert_counters(&self, counters: &[UsageCounter]) -> Result<()>;

    /// Move every counter of one key to another
    ///
    /// Returns the number of counters moved.
    async fn reassign_counters(&self, from_key: &str, to_key: &str) -> Result<u64>;
}
