//! Authorization context surfaced to the proxy engine
//!
//! Built from an enabled `ApiKeyRecord`. The proxy forwards it to tenant
//! backends as headers, replacing the caller's credential.

use std::collections::{BTreeMap, BTreeSet};

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tollgate_store::ApiKeyRecord;

use crate::credential::API_KEY_HEADER;
use crate::error::{AuthError, Result};
use crate::roles::Role;

/// Tenant identity header
pub const TENANT_HEADER: &str = "x-tenant";
/// Department header
pub const DEPARTMENT_HEADER: &str = "x-department";
/// Usage reporting URL header
pub const REPORTING_HEADER: &str = "x-reporting";
/// Quota snapshot header
pub const LIMITS_HEADER: &str = "x-limits";

/// Usage and cap of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEntry {
    /// Usage since last enable
    pub current: i64,
    /// Cap
    pub limit: i64,
}

/// Capped resources of a key at resolution time
///
/// Serializes as `{"ocr":{"current":5,"limit":100}}`. Uncapped resources
/// (`limit == 0`) are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotaSnapshot(BTreeMap<String, QuotaEntry>);

impl QuotaSnapshot {
    /// Snapshot of a key's capped resources
    pub fn from_record(record: &ApiKeyRecord) -> Self {
        Self(
            record
                .limits
                .iter()
                .filter(|l| l.limit != 0)
                .map(|l| {
                    (
                        l.resource.clone(),
                        QuotaEntry {
                            current: l.current,
                            limit: l.limit,
                        },
                    )
                })
                .collect(),
        )
    }

    /// Entry for a resource
    pub fn get(&self, resource: &str) -> Option<&QuotaEntry> {
        self.0.get(resource)
    }

    /// Number of capped resources
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no resource is capped
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON form carried in `x-limits`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Identity, roles and quota of an authenticated caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Primary key the credential resolved to
    pub api_key: String,
    /// Owning tenant
    pub tenant_id: Option<String>,
    /// Public usage id
    pub report_id: Option<String>,
    /// Department within the tenant
    pub department: Option<String>,
    /// Role tags
    pub roles: BTreeSet<String>,
    /// Capped resources
    pub quota: QuotaSnapshot,
}

impl AuthContext {
    /// Build from a resolved key record
    pub fn from_record(record: &ApiKeyRecord) -> Self {
        Self {
            api_key: record.key.clone(),
            tenant_id: record.tenant_id.clone(),
            report_id: record.report_id.clone(),
            department: record.department.clone(),
            roles: record.roles.clone(),
            quota: QuotaSnapshot::from_record(record),
        }
    }

    /// Whether the caller holds a role
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role.as_str())
    }

    /// Rewrite inbound request headers for the tenant backend
    ///
    /// Drops `x-api-key` and sets `x-tenant`, `x-department`, `x-reporting`
    /// and `x-limits`. A `Manager` keeps an inbound `x-tenant` so it can act
    /// on behalf of any tenant; everyone else gets their own tenant id.
    pub fn rewrite_headers(&self, headers: &mut HeaderMap, reporting_base_url: &str) -> Result<()> {
        headers.remove(API_KEY_HEADER);

        let requested_tenant = headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned);

        let tenant = match requested_tenant {
            Some(t) if self.has_role(Role::Manager) => Some(t),
            _ => self.tenant_id.clone(),
        };

        set_or_remove(headers, TENANT_HEADER, tenant.as_deref())?;
        set_or_remove(headers, DEPARTMENT_HEADER, self.department.as_deref())?;

        let reporting = self
            .report_id
            .as_ref()
            .map(|id| format!("{reporting_base_url}{id}"));
        set_or_remove(headers, REPORTING_HEADER, reporting.as_deref())?;

        let limits = self.quota.to_json()?;
        set_or_remove(headers, LIMITS_HEADER, Some(&limits))?;

        Ok(())
    }
}

fn set_or_remove(headers: &mut HeaderMap, name: &'static str, value: Option<&str>) -> Result<()> {
    let header = HeaderName::from_static(name);
    match value {
        Some(v) => {
            let value =
                HeaderValue::from_str(v).map_err(|_| AuthError::invalid_header_value(name))?;
            headers.insert(header, value);
        }
        None => {
            headers.remove(header);
        }
    }
    Ok(())
}
