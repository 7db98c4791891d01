//! Usage history queries

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tollgate_store::CredentialStore;

use crate::clock::Clock;
use crate::error::Result;

/// One persisted counter, labelled for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageRecord {
    /// Start of the counter's period
    pub timestamp: DateTime<Utc>,
    /// Department of the key the usage is billed to
    pub department: Option<String>,
    /// Resource name
    pub resource: String,
    /// Accumulated count
    pub count: i64,
}

/// Usage history filter
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Tenant whose keys are reported
    pub tenant_id: String,
    /// Window start, one day before now when unset
    pub start: Option<DateTime<Utc>>,
    /// Window end, one day after now when unset
    pub end: Option<DateTime<Utc>>,
    /// Restrict to a single key
    pub api_key: Option<String>,
}

impl HistoryQuery {
    /// All keys of a tenant over the default window
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }
}

/// Counters of a tenant's keys within a window, oldest first
pub async fn usage_history(
    store: &dyn CredentialStore,
    clock: &dyn Clock,
    query: &HistoryQuery,
) -> Result<Vec<UsageRecord>> {
    let now = clock.now();
    let start = query.start.unwrap_or(now - Duration::days(1));
    let end = query.end.unwrap_or(now + Duration::days(1));

    let mut records = Vec::new();
    for key in store.list_api_keys_for_tenant(&query.tenant_id).await? {
        if query.api_key.as_ref().is_some_and(|wanted| *wanted != key.key) {
            continue;
        }
        for counter in store.counters_in_range(&key.key, start, end).await? {
            records.push(UsageRecord {
                timestamp: counter.period_start,
                department: key.department.clone(),
                resource: counter.resource,
                count: counter.count,
            });
        }
    }

    records.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.resource.cmp(&b.resource))
    });
    Ok(records)
}
