//! Canonical tenant state and its fingerprint
//!
//! Two ticks that load routing-equivalent tenants produce the same
//! fingerprint, so the reconciler can skip rebuilding the table.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};
use tollgate_store::TenantRecord;

/// A tenant's entry points in evaluation order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTenant {
    /// Tenant id
    pub tenant_id: String,
    /// `(prefix, service)` pairs, longest prefix first
    pub entry_points: Vec<(String, String)>,
}

/// Put tenants into a deterministic, routing-ready order
///
/// Tenants are sorted by id. Tenants without entry points get
/// `defaults`. Entry points are sorted by descending prefix length, ties
/// broken alphabetically, so the `/` catch-all is always last.
pub fn canonicalize(
    tenants: &[TenantRecord],
    defaults: &BTreeMap<String, String>,
) -> Vec<CanonicalTenant> {
    let mut canonical: Vec<CanonicalTenant> = tenants
        .iter()
        .map(|tenant| {
            let source = if tenant.entry_points.is_empty() {
                defaults
            } else {
                &tenant.entry_points
            };

            let mut entry_points: Vec<(String, String)> = source
                .iter()
                .map(|(prefix, service)| (prefix.clone(), service.clone()))
                .collect();
            entry_points.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

            CanonicalTenant {
                tenant_id: tenant.tenant_id.clone(),
                entry_points,
            }
        })
        .collect();

    canonical.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
    canonical
}

/// SHA-256 over canonical tenant state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint canonical tenants
    ///
    /// Fields are separated by a NUL byte and tenants by a record
    /// separator, so `("ab", "c")` and `("a", "bc")` hash differently.
    pub fn of(tenants: &[CanonicalTenant]) -> Self {
        let mut hasher = Sha256::new();
        for tenant in tenants {
            hasher.update(tenant.tenant_id.as_bytes());
            hasher.update([0u8]);
            for (prefix, service) in &tenant.entry_points {
                hasher.update(prefix.as_bytes());
                hasher.update([0u8]);
                hasher.update(service.as_bytes());
                hasher.update([0u8]);
            }
            hasher.update([0x1eu8]);
        }
        Self(hasher.finalize().into())
    }

    /// Hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines
        f.write_str(&self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> BTreeMap<String, String> {
        BTreeMap::from([("/".to_string(), "api".to_string())])
    }

    #[test]
    fn test_longest_prefix_first() {
        let tenant = TenantRecord::new("acme", "Acme")
            .with_entry_point("/", "api")
            .with_entry_point("/ocr/", "ocr")
            .with_entry_point("/ocr/v2/", "ocr2")
            .with_entry_point("/nlp/", "nlp");

        let canonical = canonicalize(&[tenant], &defaults());
        let prefixes: Vec<&str> = canonical[0]
            .entry_points
            .iter()
            .map(|(p, _)| p.as_str())
            .collect();
        assert_eq!(prefixes, vec!["/ocr/v2/", "/nlp/", "/ocr/", "/"]);
    }

    #[test]
    fn test_defaults_substituted() {
        let canonical = canonicalize(&[TenantRecord::new("acme", "Acme")], &defaults());
        assert_eq!(
            canonical[0].entry_points,
            vec![("/".to_string(), "api".to_string())]
        );
    }

    #[test]
    fn test_tenants_sorted() {
        let canonical = canonicalize(
            &[
                TenantRecord::new("zeta", "Z"),
                TenantRecord::new("acme", "A"),
            ],
            &defaults(),
        );
        assert_eq!(canonical[0].tenant_id, "acme");
        assert_eq!(canonical[1].tenant_id, "zeta");
    }

    #[test]
    fn test_fingerprint_stable_across_input_order() {
        let a = TenantRecord::new("a", "A").with_entry_point("/", "api");
        let b = TenantRecord::new("b", "B").with_entry_point("/x/", "x");

        let first = Fingerprint::of(&canonicalize(&[a.clone(), b.clone()], &defaults()));
        let second = Fingerprint::of(&canonicalize(&[b, a], &defaults()));
        assert_eq!(first, second);
    }

    #[test]
    fn test_fingerprint_changes_with_service() {
        let v1 = TenantRecord::new("a", "A").with_entry_point("/", "api");
        let v2 = TenantRecord::new("a", "A").with_entry_point("/", "api2");

        assert_ne!(
            Fingerprint::of(&canonicalize(&[v1], &defaults())),
            Fingerprint::of(&canonicalize(&[v2], &defaults()))
        );
    }

    #[test]
    fn test_fingerprint_ignores_display_name() {
        let v1 = TenantRecord::new("a", "Acme").with_entry_point("/", "api");
        let v2 = TenantRecord::new("a", "Acme Corp").with_entry_point("/", "api");

        assert_eq!(
            Fingerprint::of(&canonicalize(&[v1], &defaults())),
            Fingerprint::of(&canonicalize(&[v2], &defaults()))
        );
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        let v1 = TenantRecord::new("ab", "").with_entry_point("/", "c");
        let v2 = TenantRecord::new("a", "").with_entry_point("b/", "c");

        assert_ne!(
            Fingerprint::of(&canonicalize(&[v1], &defaults())),
            Fingerprint::of(&canonicalize(&[v2], &defaults()))
        );
    }

    #[test]
    fn test_display_is_short_hex() {
        let fp = Fingerprint::of(&[]);
        assert_eq!(fp.to_string().len(), 12);
        assert_eq!(fp.to_hex().len(), 64);
    }
}
