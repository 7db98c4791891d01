//! Routing table consumed by the proxy engine
//!
//! A table is built once per reconciliation and never mutated afterwards.
//! Routes are kept in evaluation order: within a tenant, longer prefixes
//! come before shorter ones, so `/acme/ocr/` is tried before `/acme/`.

use std::collections::HashSet;

use serde::Serialize;

use crate::entry::{ClusterEntry, RouteEntry};
use crate::error::{Result, RoutingError};

/// Immutable set of routes and clusters
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tollgate_routing::{ClusterEntry, RouteEntry, RoutingTableBuilder};
///
/// let mut builder = RoutingTableBuilder::new();
/// builder
///     .add(
///         RouteEntry {
///             route_id: "acme-1".into(),
///             cluster_id: "acme-1".into(),
///             match_path: "/acme/{**catchall}".into(),
///             methods: vec!["GET".into()],
///             path_prefix_to_strip: "/acme".into(),
///             cors_policy: "default".into(),
///             auth_policy: "OnlyThirdParties".into(),
///         },
///         ClusterEntry {
///             cluster_id: "acme-1".into(),
///             backend_address: "http://api.acme".into(),
///             request_timeout: Duration::from_secs(600),
///         },
///     )
///     .unwrap();
///
/// let table = builder.build(1);
/// assert_eq!(table.match_route("GET", "/acme/jobs").unwrap().route_id, "acme-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    /// Publish counter, 0 for the empty initial table
    generation: u64,

    /// Routes in evaluation order
    routes: Vec<RouteEntry>,

    /// Clusters, one per route
    clusters: Vec<ClusterEntry>,
}

impl RoutingTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish counter
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    /// Routes in evaluation order
    #[inline]
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// All clusters
    #[inline]
    pub fn clusters(&self) -> &[ClusterEntry] {
        &self.clusters
    }

    /// Number of routes
    #[inline]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Number of clusters
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Whether the table has no routes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Cluster by id
    pub fn cluster(&self, cluster_id: &str) -> Option<&ClusterEntry> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }

    /// First route accepting the method and path
    pub fn match_route(&self, method: &str, path: &str) -> Option<&RouteEntry> {
        self.routes
            .iter()
            .find(|r| r.accepts_method(method) && r.matches_path(path))
    }
}

/// Builder that validates entries as they are added
#[derive(Debug, Default)]
pub struct RoutingTableBuilder {
    routes: Vec<RouteEntry>,
    clusters: Vec<ClusterEntry>,
    route_ids: HashSet<String>,
    cluster_ids: HashSet<String>,
}

impl RoutingTableBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route and the cluster it targets
    ///
    /// # Errors
    ///
    /// Rejects the pair, leaving the builder unchanged, if either entry is
    /// malformed, an id is already taken, or the route targets a different
    /// cluster.
    pub fn add(&mut self, route: RouteEntry, cluster: ClusterEntry) -> Result<()> {
        route.validate()?;
        cluster.validate()?;

        if route.cluster_id != cluster.cluster_id {
            return Err(RoutingError::unknown_cluster(
                &route.route_id,
                &route.cluster_id,
            ));
        }
        if self.route_ids.contains(&route.route_id) {
            return Err(RoutingError::duplicate_id("route", &route.route_id));
        }
        if self.cluster_ids.contains(&cluster.cluster_id) {
            return Err(RoutingError::duplicate_id("cluster", &cluster.cluster_id));
        }

        self.route_ids.insert(route.route_id.clone());
        self.cluster_ids.insert(cluster.cluster_id.clone());
        self.routes.push(route);
        self.clusters.push(cluster);
        Ok(())
    }

    /// Number of accepted routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes were accepted
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze into a table
    pub fn build(self, generation: u64) -> RoutingTable {
        RoutingTable {
            generation,
            routes: self.routes,
            clusters: self.clusters,
        }
    }
}
