//! SQLite credential store
//!
//! Entry points and roles are stored as JSON text columns. Timestamps are
//! RFC 3339 UTC with fixed microsecond precision, so string comparison in
//! range queries matches time order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::model::{ApiKeyRecord, TenantRecord, UsageCounter, UsageLimit};
use crate::store::CredentialStore;

/// Credential store backed by SQLite via SQLx
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create a database at the given path
    ///
    /// Creates parent directories and the schema if they don't exist.
    pub async fn open<P: AsRef<Path>>(path: P, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Directory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;

        info!(path = %path.display(), "credential store opened");
        Ok(store)
    }

    /// Create a private in-memory database
    ///
    /// The pool is pinned to one connection that never expires, since every
    /// SQLite memory connection is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn load_limits(&self, key: &str) -> Result<Vec<UsageLimit>> {
        let rows = sqlx::query(
            "SELECT resource, current, quota FROM usage_limits WHERE api_key = ? ORDER BY resource",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| UsageLimit {
                resource: row.get("resource"),
                current: row.get("current"),
                limit: row.get("quota"),
            })
            .collect())
    }

    async fn load_key(&self, row: Option<SqliteRow>) -> Result<Option<ApiKeyRecord>> {
        match row {
            Some(row) => {
                let mut record = key_from_row(&row)?;
                record.limits = self.load_limits(&record.key).await?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }
}

/// Fixed-width timestamp text
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(column: &'static str, row: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(column, row, e.to_string()))
}

fn key_from_row(row: &SqliteRow) -> Result<ApiKeyRecord> {
    let key: String = row.get("key");
    let roles_json: String = row.get("roles");
    let created_str: String = row.get("created_at");

    let roles: BTreeSet<String> = serde_json::from_str(&roles_json)?;
    let created_at = parse_ts("created_at", &key, &created_str)?;

    Ok(ApiKeyRecord {
        report_id: row.get("report_id"),
        tenant_id: row.get("tenant_id"),
        department: row.get("department"),
        enabled: row.get("enabled"),
        roles,
        limits: Vec::new(),
        created_at,
        key,
    })
}

fn tenant_from_row(row: &SqliteRow) -> Result<TenantRecord> {
    let entry_points_json: String = row.get("entry_points");
    let entry_points: BTreeMap<String, String> = serde_json::from_str(&entry_points_json)?;

    Ok(TenantRecord {
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        entry_points,
    })
}

fn counter_from_row(row: &SqliteRow) -> Result<UsageCounter> {
    let api_key_id: String = row.get("api_key");
    let start_str: String = row.get("period_start");
    let period_start = parse_ts("period_start", &api_key_id, &start_str)?;

    Ok(UsageCounter {
        resource: row.get("resource"),
        count: row.get("count"),
        period_start,
        api_key_id,
    })
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                tenant_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                entry_points TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                key TEXT PRIMARY KEY,
                report_id TEXT UNIQUE,
                tenant_id TEXT,
                department TEXT,
                enabled INTEGER NOT NULL DEFAULT 1,
                roles TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_api_keys_tenant ON api_keys(tenant_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_limits (
                api_key TEXT NOT NULL,
                resource TEXT NOT NULL,
                current INTEGER NOT NULL DEFAULT 0,
                quota INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (api_key, resource),
                FOREIGN KEY (api_key) REFERENCES api_keys(key) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_counters (
                api_key TEXT NOT NULL,
                resource TEXT NOT NULL,
                period_start TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (api_key, resource, period_start)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("credential store schema initialized");
        Ok(())
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRecord>> {
        let rows = sqlx::query("SELECT tenant_id, name, entry_points FROM tenants ORDER BY tenant_id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(tenant_from_row).collect()
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>> {
        let row = sqlx::query("SELECT tenant_id, name, entry_points FROM tenants WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(tenant_from_row).transpose()
    }

    async fn upsert_tenants(&self, tenants: &[TenantRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for tenant in tenants {
            let entry_points = serde_json::to_string(&tenant.entry_points)?;
            sqlx::query(
                r#"
                INSERT INTO tenants (tenant_id, name, entry_points) VALUES (?, ?, ?)
                ON CONFLICT(tenant_id) DO UPDATE SET
                    name = excluded.name,
                    entry_points = excluded.entry_points
                "#,
            )
            .bind(&tenant.tenant_id)
            .bind(&tenant.name)
            .bind(entry_points)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT key, report_id, tenant_id, department, enabled, roles, created_at
            FROM api_keys WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        self.load_key(row).await
    }

    async fn get_api_key_by_report_id(&self, report_id: &str) -> Result<Option<ApiKeyRecord>> {
        let row = sqlx::query(
            r#"
            SELECT key, report_id, tenant_id, department, enabled, roles, created_at
            FROM api_keys WHERE report_id = ?
            "#,
        )
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await?;

        self.load_key(row).await
    }

    async fn list_api_keys_for_tenant(&self, tenant_id: &str) -> Result<Vec<ApiKeyRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT key, report_id, tenant_id, department, enabled, roles, created_at
            FROM api_keys WHERE tenant_id = ? ORDER BY key
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = key_from_row(row)?;
            record.limits = self.load_limits(&record.key).await?;
            keys.push(record);
        }
        Ok(keys)
    }

    async fn has_api_keys(&self) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_keys)")
            .fetch_one(&self.pool)
            .await?;

        Ok(exists != 0)
    }

    async fn upsert_api_keys(&self, keys: &[ApiKeyRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in keys {
            let roles = serde_json::to_string(&record.roles)?;
            sqlx::query(
                r#"
                INSERT INTO api_keys (key, report_id, tenant_id, department, enabled, roles, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                    report_id = excluded.report_id,
                    tenant_id = excluded.tenant_id,
                    department = excluded.department,
                    enabled = excluded.enabled,
                    roles = excluded.roles
                "#,
            )
            .bind(&record.key)
            .bind(&record.report_id)
            .bind(&record.tenant_id)
            .bind(&record.department)
            .bind(record.enabled)
            .bind(roles)
            .bind(format_ts(record.created_at))
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM usage_limits WHERE api_key = ?")
                .bind(&record.key)
                .execute(&mut *tx)
                .await?;

            for limit in &record.limits {
                sqlx::query(
                    "INSERT INTO usage_limits (api_key, resource, current, quota) VALUES (?, ?, ?, ?)",
                )
                .bind(&record.key)
                .bind(&limit.resource)
                .bind(limit.current)
                .bind(limit.limit)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_usage_limit(&self, key: &str, limit: &UsageLimit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_limits (api_key, resource, current, quota)
            SELECT ?, ?, ?, ? WHERE EXISTS (SELECT 1 FROM api_keys WHERE key = ?)
            ON CONFLICT(api_key, resource) DO UPDATE SET
                current = excluded.current,
                quota = excluded.quota
            "#,
        )
        .bind(key)
        .bind(&limit.resource)
        .bind(limit.current)
        .bind(limit.limit)
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_api_key(&self, key: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM usage_limits WHERE api_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM usage_counters WHERE api_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM api_keys WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn latest_counter(
        &self,
        api_key_id: &str,
        resource: &str,
    ) -> Result<Option<UsageCounter>> {
        let row = sqlx::query(
            r#"
            SELECT api_key, resource, period_start, count FROM usage_counters
            WHERE api_key = ? AND resource = ?
            ORDER BY period_start DESC LIMIT 1
            "#,
        )
        .bind(api_key_id)
        .bind(resource)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(counter_from_row).transpose()
    }

    async fn counters_in_range(
        &self,
        api_key_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UsageCounter>> {
        let rows = sqlx::query(
            r#"
            SELECT api_key, resource, period_start, count FROM usage_counters
            WHERE api_key = ? AND period_start >= ? AND period_start <= ?
            ORDER BY period_start, resource
            "#,
        )
        .bind(api_key_id)
        .bind(format_ts(start))
        .bind(format_ts(end))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(counter_from_row).collect()
    }

    async fn upsert_counters(&self, counters: &[UsageCounter]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for counter in counters {
            sqlx::query(
                r#"
                INSERT INTO usage_counters (api_key, resource, period_start, count)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(api_key, resource, period_start) DO UPDATE SET
                    count = excluded.count
                "#,
            )
            .bind(&counter.api_key_id)
            .bind(&counter.resource)
            .bind(format_ts(counter.period_start))
            .bind(counter.count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn reassign_counters(&self, from_key: &str, to_key: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO usage_counters (api_key, resource, period_start, count)
            SELECT ?, resource, period_start, count FROM usage_counters WHERE api_key = ?
            ON CONFLICT(api_key, resource, period_start) DO UPDATE SET
                count = usage_counters.count + excluded.count
            "#,
        )
        .bind(to_key)
        .bind(from_key)
        .execute(&mut *tx)
        .await?;

        let moved = sqlx::query("DELETE FROM usage_counters WHERE api_key = ?")
            .bind(from_key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(moved.rows_affected())
    }
}
