//! Tests for the credential store backends
//!
//! Each scenario runs against both `MemoryStore` and an in-memory
//! `SqliteStore` so the two backends stay interchangeable.

use chrono::{Duration, TimeZone, Utc};

use crate::{
    ApiKeyRecord, CredentialStore, MemoryStore, SqliteStore, TenantRecord, UsageCounter,
    UsageLimit,
};

async fn backends() -> Vec<(&'static str, Box<dyn CredentialStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("sqlite", Box::new(SqliteStore::in_memory().await.unwrap())),
    ]
}

fn counter(key: &str, resource: &str, day: u32, count: i64) -> UsageCounter {
    UsageCounter {
        api_key_id: key.to_string(),
        resource: resource.to_string(),
        period_start: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
        count,
    }
}

fn sample_key() -> ApiKeyRecord {
    ApiKeyRecord::new("secret-1")
        .with_report_id("r1")
        .with_tenant("acme")
        .with_department("billing")
        .with_role("ThirdParty")
        .with_limit(UsageLimit::new("ocr", 100))
        .with_limit(UsageLimit::new("translate", 0))
}

// =============================================================================
// Tenants
// =============================================================================

#[tokio::test]
async fn test_tenant_upsert_and_list() {
    for (name, store) in backends().await {
        let acme = TenantRecord::new("acme", "Acme").with_entry_point("/", "api");
        let globex = TenantRecord::new("globex", "Globex");
        store.upsert_tenants(&[globex, acme.clone()]).await.unwrap();

        let tenants = store.list_tenants().await.unwrap();
        let ids: Vec<&str> = tenants.iter().map(|t| t.tenant_id.as_str()).collect();
        assert_eq!(ids, vec!["acme", "globex"], "{name}");

        let fetched = store.get_tenant("acme").await.unwrap();
        assert_eq!(fetched, Some(acme), "{name}");
    }
}

#[tokio::test]
async fn test_tenant_upsert_replaces_entry_points() {
    for (name, store) in backends().await {
        let v1 = TenantRecord::new("acme", "Acme").with_entry_point("/", "api");
        let v2 = TenantRecord::new("acme", "Acme Corp").with_entry_point("/ocr", "ocr");
        store.upsert_tenants(&[v1]).await.unwrap();
        store.upsert_tenants(&[v2.clone()]).await.unwrap();

        assert_eq!(store.get_tenant("acme").await.unwrap(), Some(v2), "{name}");
        assert_eq!(store.list_tenants().await.unwrap().len(), 1, "{name}");
    }
}

// =============================================================================
// API keys
// =============================================================================

#[tokio::test]
async fn test_api_key_lookup_by_key_and_report_id() {
    for (name, store) in backends().await {
        let record = sample_key();
        store.upsert_api_keys(&[record.clone()]).await.unwrap();

        let by_key = store.get_api_key("secret-1").await.unwrap().unwrap();
        assert_eq!(by_key.report_id.as_deref(), Some("r1"), "{name}");
        assert_eq!(by_key.limits.len(), 2, "{name}");
        assert!(by_key.has_role("ThirdParty"), "{name}");

        let by_report = store.get_api_key_by_report_id("r1").await.unwrap().unwrap();
        assert_eq!(by_report.key, "secret-1", "{name}");

        assert!(store.get_api_key("missing").await.unwrap().is_none(), "{name}");
        assert!(store.get_api_key_by_report_id("r9").await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_has_api_keys() {
    for (name, store) in backends().await {
        assert!(!store.has_api_keys().await.unwrap(), "{name}");
        store.upsert_api_keys(&[sample_key()]).await.unwrap();
        assert!(store.has_api_keys().await.unwrap(), "{name}");
    }
}

#[tokio::test]
async fn test_upsert_replaces_limits() {
    for (name, store) in backends().await {
        store.upsert_api_keys(&[sample_key()]).await.unwrap();

        let mut updated = sample_key();
        updated.limits = vec![UsageLimit::new("ocr", 50)];
        updated.enabled = false;
        store.upsert_api_keys(&[updated]).await.unwrap();

        let fetched = store.get_api_key("secret-1").await.unwrap().unwrap();
        assert!(!fetched.enabled, "{name}");
        assert_eq!(fetched.limits, vec![UsageLimit::new("ocr", 50)], "{name}");
    }
}

#[tokio::test]
async fn test_upsert_usage_limit() {
    for (name, store) in backends().await {
        store.upsert_api_keys(&[sample_key()]).await.unwrap();

        let ocr = UsageLimit {
            resource: "ocr".into(),
            current: 7,
            limit: 100,
        };
        store.upsert_usage_limit("secret-1", &ocr).await.unwrap();
        store
            .upsert_usage_limit("secret-1", &UsageLimit::new("embed", 0))
            .await
            .unwrap();

        let fetched = store.get_api_key("secret-1").await.unwrap().unwrap();
        assert_eq!(fetched.limit("ocr").map(|l| l.current), Some(7), "{name}");
        assert!(fetched.limit("embed").is_some(), "{name}");
    }
}

#[tokio::test]
async fn test_upsert_usage_limit_unknown_key_is_noop() {
    for (name, store) in backends().await {
        store
            .upsert_usage_limit("ghost", &UsageLimit::new("ocr", 1))
            .await
            .unwrap();
        assert!(store.get_api_key("ghost").await.unwrap().is_none(), "{name}");
    }
}

#[tokio::test]
async fn test_list_keys_for_tenant() {
    for (name, store) in backends().await {
        let other = ApiKeyRecord::new("secret-2").with_tenant("globex");
        let second = ApiKeyRecord::new("secret-0").with_tenant("acme");
        store
            .upsert_api_keys(&[sample_key(), other, second])
            .await
            .unwrap();

        let keys = store.list_api_keys_for_tenant("acme").await.unwrap();
        let ids: Vec<&str> = keys.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(ids, vec!["secret-0", "secret-1"], "{name}");
    }
}

#[tokio::test]
async fn test_delete_api_key() {
    for (name, store) in backends().await {
        store.upsert_api_keys(&[sample_key()]).await.unwrap();
        store
            .upsert_counters(&[counter("secret-1", "ocr", 1, 5)])
            .await
            .unwrap();

        assert!(store.delete_api_key("secret-1").await.unwrap(), "{name}");
        assert!(!store.delete_api_key("secret-1").await.unwrap(), "{name}");
        assert!(store.get_api_key("secret-1").await.unwrap().is_none(), "{name}");
        assert!(
            store
                .latest_counter("secret-1", "ocr")
                .await
                .unwrap()
                .is_none(),
            "{name}"
        );
    }
}

// =============================================================================
// Usage counters
// =============================================================================

#[tokio::test]
async fn test_latest_counter_picks_newest_period() {
    for (name, store) in backends().await {
        store
            .upsert_counters(&[
                counter("k", "ocr", 1, 5),
                counter("k", "ocr", 3, 9),
                counter("k", "ocr", 2, 7),
                counter("k", "translate", 4, 1),
            ])
            .await
            .unwrap();

        let latest = store.latest_counter("k", "ocr").await.unwrap().unwrap();
        assert_eq!(latest, counter("k", "ocr", 3, 9), "{name}");
    }
}

#[tokio::test]
async fn test_upsert_counters_replaces_count() {
    for (name, store) in backends().await {
        store
            .upsert_counters(&[counter("k", "ocr", 1, 5)])
            .await
            .unwrap();
        store
            .upsert_counters(&[counter("k", "ocr", 1, 8)])
            .await
            .unwrap();

        let latest = store.latest_counter("k", "ocr").await.unwrap().unwrap();
        assert_eq!(latest.count, 8, "{name}");
    }
}

#[tokio::test]
async fn test_counters_in_range_is_inclusive_and_ordered() {
    for (name, store) in backends().await {
        store
            .upsert_counters(&[
                counter("k", "ocr", 5, 50),
                counter("k", "ocr", 1, 10),
                counter("k", "embed", 3, 30),
                counter("k", "ocr", 3, 31),
                counter("other", "ocr", 3, 99),
            ])
            .await
            .unwrap();

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(2);
        let counters = store.counters_in_range("k", start, end).await.unwrap();

        let got: Vec<(u32, &str)> = counters
            .iter()
            .map(|c| (chrono::Datelike::day(&c.period_start), c.resource.as_str()))
            .collect();
        assert_eq!(got, vec![(1, "ocr"), (3, "embed"), (3, "ocr")], "{name}");
    }
}

#[tokio::test]
async fn test_reassign_counters() {
    for (name, store) in backends().await {
        store
            .upsert_counters(&[counter("old", "ocr", 1, 5), counter("old", "ocr", 2, 6)])
            .await
            .unwrap();

        let moved = store.reassign_counters("old", "new").await.unwrap();
        assert_eq!(moved, 2, "{name}");
        assert!(store.latest_counter("old", "ocr").await.unwrap().is_none(), "{name}");
        assert_eq!(
            store.latest_counter("new", "ocr").await.unwrap().map(|c| c.count),
            Some(6),
            "{name}"
        );
    }
}

// =============================================================================
// On-disk SQLite
// =============================================================================

#[tokio::test]
async fn test_sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("tollgate.db");

    {
        let store = SqliteStore::open(&path, 2).await.unwrap();
        store.upsert_api_keys(&[sample_key()]).await.unwrap();
    }

    let store = SqliteStore::open(&path, 2).await.unwrap();
    let record = store.get_api_key("secret-1").await.unwrap().unwrap();
    assert_eq!(record.tenant_id.as_deref(), Some("acme"));
    assert_eq!(record.limits.len(), 2);
}

#[tokio::test]
async fn test_sqlite_preserves_created_at_precision() {
    let store = SqliteStore::in_memory().await.unwrap();
    let mut record = sample_key();
    record.created_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        + Duration::microseconds(123_456);
    store.upsert_api_keys(&[record.clone()]).await.unwrap();

    let fetched = store.get_api_key("secret-1").await.unwrap().unwrap();
    assert_eq!(fetched.created_at, record.created_at);
}
