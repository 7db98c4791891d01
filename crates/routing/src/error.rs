//! Routing error types

use thiserror::Error;
use tollgate_store::StoreError;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors raised while building or publishing a routing table
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Tenant list could not be loaded
    #[error("failed to load tenants: {0}")]
    Store(#[from] StoreError),

    /// Tenant id cannot be embedded in a path and a host name
    #[error("invalid tenant id '{tenant_id}': {reason}")]
    InvalidTenant {
        /// Offending tenant
        tenant_id: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Route or cluster id is empty
    #[error("{kind} id is empty")]
    EmptyId {
        /// "route" or "cluster"
        kind: &'static str,
    },

    /// Route or cluster id already present in the table
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId {
        /// "route" or "cluster"
        kind: &'static str,
        /// The repeated id
        id: String,
    },

    /// Route match path is malformed
    #[error("route '{route_id}' has invalid path '{path}': {reason}")]
    InvalidPath {
        /// Offending route
        route_id: String,
        /// The path
        path: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Cluster backend address is malformed
    #[error("cluster '{cluster_id}' has invalid address '{address}': {reason}")]
    InvalidAddress {
        /// Offending cluster
        cluster_id: String,
        /// The address
        address: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Route references a cluster the table doesn't define
    #[error("route '{route_id}' references unknown cluster '{cluster_id}'")]
    UnknownCluster {
        /// Offending route
        route_id: String,
        /// Missing cluster
        cluster_id: String,
    },
}

impl RoutingError {
    /// Create an InvalidTenant error
    pub fn invalid_tenant(tenant_id: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidTenant {
            tenant_id: tenant_id.into(),
            reason,
        }
    }

    /// Create an EmptyId error
    pub fn empty_id(kind: &'static str) -> Self {
        Self::EmptyId { kind }
    }

    /// Create a DuplicateId error
    pub fn duplicate_id(kind: &'static str, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            kind,
            id: id.into(),
        }
    }

    /// Create an InvalidPath error
    pub fn invalid_path(
        route_id: impl Into<String>,
        path: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidPath {
            route_id: route_id.into(),
            path: path.into(),
            reason,
        }
    }

    /// Create an InvalidAddress error
    pub fn invalid_address(
        cluster_id: impl Into<String>,
        address: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidAddress {
            cluster_id: cluster_id.into(),
            address: address.into(),
            reason,
        }
    }

    /// Create an UnknownCluster error
    pub fn unknown_cluster(route_id: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self::UnknownCluster {
            route_id: route_id.into(),
            cluster_id: cluster_id.into(),
        }
    }
}
