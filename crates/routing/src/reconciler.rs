//! Tenant route reconciliation
//!
//! Polls the tenant list on a fixed interval and republishes the routing
//! table whenever routing-relevant tenant state changes.
//!
//! # Naming
//!
//! For tenant `acme`, its `c`-th entry point `(prefix, service)` becomes:
//!
//! | Field | Value |
//! |-------|-------|
//! | route / cluster id | `acme-{c}` |
//! | match path | `/acme{prefix}/{**catchall}` |
//! | prefix to strip | `/acme{prefix}` without trailing `/` |
//! | backend | `http://{service}.acme` or `http://{service}.{ns}-acme` |
//!
//! Tenant ids must be usable as a DNS label: lowercase letters, digits and
//! inner '-', at most 63 characters. Tenants with any other id get no
//! routes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tollgate_store::CredentialStore;
use tracing::{debug, error, info, warn};

use crate::entry::{CATCH_ALL, ClusterEntry, ROUTE_METHODS, RouteEntry};
use crate::error::{Result, RoutingError};
use crate::fingerprint::{CanonicalTenant, Fingerprint, canonicalize};
use crate::publisher::RoutingTablePublisher;
use crate::table::{RoutingTable, RoutingTableBuilder};

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;

/// Reconciler configuration
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Time between polls
    pub interval: Duration,
    /// Timeout attached to every cluster
    pub request_timeout: Duration,
    /// CORS policy attached to every route
    pub cors_policy: String,
    /// Authorization policy attached to every route
    pub auth_policy: String,
    /// Optional prefix for tenant backend namespaces
    pub prefix_namespace: Option<String>,
    /// Entry points for tenants that declare none
    pub default_entry_points: BTreeMap<String, String>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(600),
            cors_policy: "default".to_string(),
            auth_policy: "OnlyThirdParties".to_string(),
            prefix_namespace: None,
            default_entry_points: BTreeMap::from([("/".to_string(), "api".to_string())]),
        }
    }
}

/// Longest tenant id that fits one DNS label
const MAX_TENANT_ID_LEN: usize = 63;

/// What a single reconciliation tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tenant state matched the last published fingerprint
    Unchanged {
        /// Current fingerprint
        fingerprint: Fingerprint,
    },
    /// A new table was published
    Published {
        /// Generation of the new table
        generation: u64,
        /// Accepted routes
        routes: usize,
        /// Entry points dropped by validation
        dropped: usize,
        /// Fingerprint of the published state
        fingerprint: Fingerprint,
    },
}

/// Check a tenant id can be embedded in a path segment and a host name
fn validate_tenant_id(tenant_id: &str) -> Result<()> {
    let invalid = |reason| RoutingError::invalid_tenant(tenant_id, reason);

    if tenant_id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if tenant_id.len() > MAX_TENANT_ID_LEN {
        return Err(invalid("longer than 63 characters"));
    }
    if !tenant_id
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(invalid("must be lowercase letters, digits or '-'"));
    }
    if tenant_id.starts_with('-') || tenant_id.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }
    Ok(())
}

/// Build the route for one tenant entry point
fn candidate(
    tenant_id: &str,
    index: usize,
    prefix: &str,
    service: &str,
    settings: &ReconcilerSettings,
) -> Result<(RouteEntry, ClusterEntry)> {
    let id = format!("{tenant_id}-{index}");

    if !prefix.starts_with('/') {
        return Err(RoutingError::invalid_path(
            &id,
            prefix,
            "entry point prefix must start with '/'",
        ));
    }

    let segment = if prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    };

    let route = RouteEntry {
        route_id: id.clone(),
        cluster_id: id.clone(),
        match_path: format!("/{tenant_id}{segment}{CATCH_ALL}"),
        methods: ROUTE_METHODS.iter().map(|m| m.to_string()).collect(),
        path_prefix_to_strip: format!("/{tenant_id}{}", prefix.trim_end_matches('/')),
        cors_policy: settings.cors_policy.clone(),
        auth_policy: settings.auth_policy.clone(),
    };

    let host = match &settings.prefix_namespace {
        Some(ns) => format!("{service}.{ns}-{tenant_id}"),
        None => format!("{service}.{tenant_id}"),
    };

    let cluster = ClusterEntry {
        cluster_id: id,
        backend_address: format!("http://{host}"),
        request_timeout: settings.request_timeout,
    };

    Ok((route, cluster))
}

/// Build a routing table from canonical tenants
///
/// Invalid entries are logged and skipped. Returns the table (generation 0,
/// stamped on publish) and the number of skipped entries.
pub fn build_table(
    tenants: &[CanonicalTenant],
    settings: &ReconcilerSettings,
) -> (RoutingTable, usize) {
    let mut builder = RoutingTableBuilder::new();
    let mut dropped = 0;

    for tenant in tenants {
        if let Err(e) = validate_tenant_id(&tenant.tenant_id) {
            warn!(
                tenant = %tenant.tenant_id,
                entry_points = tenant.entry_points.len(),
                error = %e,
                "dropping routes of invalid tenant"
            );
            dropped += tenant.entry_points.len();
            continue;
        }

        for (i, (prefix, service)) in tenant.entry_points.iter().enumerate() {
            let added = candidate(&tenant.tenant_id, i + 1, prefix, service, settings)
                .and_then(|(route, cluster)| builder.add(route, cluster));

            if let Err(e) = added {
                warn!(
                    tenant = %tenant.tenant_id,
                    prefix = %prefix,
                    error = %e,
                    "dropping invalid route"
                );
                dropped += 1;
            }
        }
    }

    (builder.build(0), dropped)
}

/// Keeps the published routing table in sync with the tenant store
pub struct TenantRouteReconciler {
    store: Arc<dyn CredentialStore>,
    publisher: RoutingTablePublisher,
    settings: ReconcilerSettings,
    last_fingerprint: Option<Fingerprint>,
}

impl TenantRouteReconciler {
    /// Create a reconciler that has not published yet
    pub fn new(
        store: Arc<dyn CredentialStore>,
        publisher: RoutingTablePublisher,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            publisher,
            settings,
            last_fingerprint: None,
        }
    }

    /// Fingerprint of the last published state
    pub fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.last_fingerprint
    }

    /// Run one reconciliation
    ///
    /// Loads all tenants, and if their canonical state differs from the
    /// last publish, rebuilds and publishes the table.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let tenants = self.store.list_tenants().await?;
        let canonical = canonicalize(&tenants, &self.settings.default_entry_points);
        let fingerprint = Fingerprint::of(&canonical);

        if self.last_fingerprint == Some(fingerprint) {
            return Ok(TickOutcome::Unchanged { fingerprint });
        }

        let (table, dropped) = build_table(&canonical, &self.settings);
        let routes = table.route_count();
        let generation = self.publisher.publish(table);
        self.last_fingerprint = Some(fingerprint);

        Ok(TickOutcome::Published {
            generation,
            routes,
            dropped,
            fingerprint,
        })
    }

    /// Run until cancelled
    ///
    /// A failed tick is logged and retried at the next interval.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.settings.interval.as_secs(),
            "tenant route reconciler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(TickOutcome::Published { generation, routes, dropped, fingerprint }) => {
                            info!(
                                generation,
                                routes,
                                dropped,
                                fingerprint = %fingerprint,
                                "routing table published"
                            );
                        }
                        Ok(TickOutcome::Unchanged { fingerprint }) => {
                            debug!(fingerprint = %fingerprint, "tenants unchanged");
                        }
                        Err(e) => {
                            error!(error = %e, "route reconciliation failed");
                        }
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        info!("tenant route reconciler stopped");
    }
}
