//! Persisted records
//!
//! Records reference each other by identifier only. An API key names its
//! tenant by `tenant_id`; a usage counter names its key by `api_key_id`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer whose traffic is routed to dedicated backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    /// Lowercase ASCII id, embedded in route paths and backend host names
    pub tenant_id: String,
    /// Display name
    pub name: String,
    /// URL prefix → backend service
    pub entry_points: BTreeMap<String, String>,
}

impl TenantRecord {
    /// Create a tenant with no entry points
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: name.into(),
            entry_points: BTreeMap::new(),
        }
    }

    /// Add an entry point
    pub fn with_entry_point(mut self, prefix: impl Into<String>, service: impl Into<String>) -> Self {
        self.entry_points.insert(prefix.into(), service.into());
        self
    }
}

/// Per-resource quota entry carried by an API key
///
/// A `limit` of 0 means the resource is tracked but not capped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimit {
    /// Resource name (e.g. "ocr")
    pub resource: String,
    /// Usage since the key was last enabled
    pub current: i64,
    /// Cap, or 0 when uncapped
    pub limit: i64,
}

impl UsageLimit {
    /// Create an entry with no usage yet
    pub fn new(resource: impl Into<String>, limit: i64) -> Self {
        Self {
            resource: resource.into(),
            current: 0,
            limit,
        }
    }
}

/// An API key with its roles and quotas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Secret key value, primary identifier
    pub key: String,
    /// Public id under which usage is reported
    pub report_id: Option<String>,
    /// Owning tenant
    pub tenant_id: Option<String>,
    /// Department within the tenant
    pub department: Option<String>,
    /// Disabled keys fail authentication
    pub enabled: bool,
    /// Role tags
    pub roles: BTreeSet<String>,
    /// Quotas, at most one per resource
    pub limits: Vec<UsageLimit>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    /// Create an enabled key with no tenant, roles or limits
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            report_id: None,
            tenant_id: None,
            department: None,
            enabled: true,
            roles: BTreeSet::new(),
            limits: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the report id
    pub fn with_report_id(mut self, report_id: impl Into<String>) -> Self {
        self.report_id = Some(report_id.into());
        self
    }

    /// Set the owning tenant
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the department
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Add a role tag
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Add or replace a quota entry
    pub fn with_limit(mut self, limit: UsageLimit) -> Self {
        self.limits.retain(|l| l.resource != limit.resource);
        self.limits.push(limit);
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Whether the key carries a role tag
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Quota entry for a resource
    pub fn limit(&self, resource: &str) -> Option<&UsageLimit> {
        self.limits.iter().find(|l| l.resource == resource)
    }

    /// Quota entry for a resource, created uncapped when absent
    pub fn limit_entry(&mut self, resource: &str) -> &mut UsageLimit {
        let idx = match self.limits.iter().position(|l| l.resource == resource) {
            Some(idx) => idx,
            None => {
                self.limits.push(UsageLimit::new(resource, 0));
                self.limits.len() - 1
            }
        };
        &mut self.limits[idx]
    }
}

/// Usage count of one resource by one key within one calendar period
///
/// `(api_key_id, resource, period_start)` is unique. A counter is never
/// moved to another period; rollover opens a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Key the usage is billed to
    pub api_key_id: String,
    /// Resource name
    pub resource: String,
    /// Start of the period the counter covers
    pub period_start: DateTime<Utc>,
    /// Accumulated count
    pub count: i64,
}
