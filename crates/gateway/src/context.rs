//! Shared control plane state
//!
//! Built once at startup and handed to every task. Nothing here is global;
//! tests build as many independent contexts as they like.

use std::sync::Arc;

use anyhow::{Context, Result};
use http::HeaderMap;
use tokio_util::sync::CancellationToken;
use tollgate_auth::{ApiKeyCache, AuthContext, AuthOutcome, CacheJanitor, Policy, RejectReason};
use tollgate_config::{Config, StoreBackend, StoreConfig};
use tollgate_metering::{
    Clock, ConsolidationWorker, HistoryQuery, UsageEvent, UsageMeter, UsageRecord, usage_history,
};
use tollgate_routing::{RoutingTablePublisher, TenantRouteReconciler};
use tollgate_store::{CredentialStore, MemoryStore, SqliteStore};
use tracing::{debug, info};

use crate::settings::{metering_settings, reconciler_settings};

/// Open the configured credential store
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn CredentialStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.path, config.max_connections)
                .await
                .with_context(|| format!("failed to open store at {}", config.path.display()))?;
            info!(path = %config.path.display(), "sqlite store opened");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("in-memory store opened, state is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// What the proxy should do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No route matches the method and path
    NoRoute,
    /// The request carries no credential
    Unauthenticated,
    /// The credential is unknown or disabled
    Rejected(RejectReason),
    /// The caller lacks the role the route's policy requires
    Forbidden {
        /// Policy name on the route
        policy: String,
    },
    /// Forward to the backend; headers were rewritten in place
    Forward {
        /// Matched route
        route_id: String,
        /// Backend base address
        backend_address: String,
        /// Request path with the route prefix stripped
        path: String,
        /// Authenticated caller
        context: AuthContext,
    },
}

/// Handles to every control plane component
pub struct GatewayContext {
    /// Credential store
    pub store: Arc<dyn CredentialStore>,
    /// API key cache shared by authentication and live quotas
    pub cache: Arc<ApiKeyCache>,
    /// Usage reporting handle
    pub meter: UsageMeter,
    /// Current routing table
    pub publisher: RoutingTablePublisher,
    /// Time source for metering
    pub clock: Arc<dyn Clock>,
    config: Config,
}

impl GatewayContext {
    /// Wire the components together
    ///
    /// Returns the context and the consolidation worker, which the caller
    /// spawns. The worker stops when `cancel` fires.
    pub fn new(
        config: Config,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> (Self, ConsolidationWorker) {
        let cache = Arc::new(ApiKeyCache::with_purge_batch_size(
            Arc::clone(&store),
            config.auth.purge_batch_size,
        ));
        let (worker, queue) = ConsolidationWorker::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            metering_settings(&config.metering),
            Arc::clone(&clock),
            cancel,
        );
        let meter = UsageMeter::new(Arc::clone(&cache), queue);

        let context = Self {
            store,
            cache,
            meter,
            publisher: RoutingTablePublisher::new(),
            clock,
            config,
        };
        (context, worker)
    }

    /// Loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Route reconciler publishing into this context
    pub fn reconciler(&self) -> TenantRouteReconciler {
        TenantRouteReconciler::new(
            Arc::clone(&self.store),
            self.publisher.clone(),
            reconciler_settings(&self.config),
        )
    }

    /// Cache janitor for this context's key cache
    pub fn janitor(&self, cancel: CancellationToken) -> CacheJanitor {
        CacheJanitor::new(
            Arc::clone(&self.cache),
            self.config.auth.cache_capacity,
            self.config.auth.purge_interval,
            cancel,
        )
    }

    /// Decide how to handle an inbound request
    ///
    /// Matches the current routing table, authenticates the credential,
    /// checks the route's policy, and on success rewrites `headers` for the
    /// tenant backend.
    pub async fn admit(&self, method: &str, path: &str, headers: &mut HeaderMap) -> Result<Admission> {
        let table = self.publisher.current();
        let Some(route) = table.match_route(method, path) else {
            return Ok(Admission::NoRoute);
        };
        let Some(cluster) = table.cluster(&route.cluster_id) else {
            return Ok(Admission::NoRoute);
        };

        let context = match self.cache.authenticate(headers).await? {
            AuthOutcome::NoCredential => return Ok(Admission::Unauthenticated),
            AuthOutcome::Rejected(reason) => {
                debug!(route = %route.route_id, reason = reason.message(), "credential rejected");
                return Ok(Admission::Rejected(reason));
            }
            AuthOutcome::Authenticated(context) => context,
        };

        let allowed = Policy::parse(&route.auth_policy).is_some_and(|p| p.allows(&context));
        if !allowed {
            return Ok(Admission::Forbidden {
                policy: route.auth_policy.clone(),
            });
        }

        context.rewrite_headers(headers, &self.config.gateway.reporting_base_url)?;

        let stripped = path
            .strip_prefix(route.path_prefix_to_strip.as_str())
            .unwrap_or(path);
        let path = if stripped.is_empty() {
            "/".to_string()
        } else {
            stripped.to_string()
        };

        Ok(Admission::Forward {
            route_id: route.route_id.clone(),
            backend_address: cluster.backend_address.clone(),
            path,
            context,
        })
    }

    /// Report usage for a caller
    pub async fn report_usage(&self, event: UsageEvent) -> bool {
        self.meter.report(event).await
    }

    /// Persisted usage of a tenant
    pub async fn usage_history(&self, query: &HistoryQuery) -> Result<Vec<UsageRecord>> {
        Ok(usage_history(self.store.as_ref(), self.clock.as_ref(), query).await?)
    }
}
