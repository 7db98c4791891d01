//! Route reconciliation configuration

use serde::Deserialize;
use std::time::Duration;

/// Reconciler configuration
///
/// ```toml
/// [reconciler]
/// interval = "60s"
/// request_timeout = "10m"
/// cors_policy = "default"
/// auth_policy = "OnlyThirdParties"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Time between tenant polls
    /// Default: 60s
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Upstream timeout attached to every cluster
    /// Default: 10m
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// CORS policy name attached to every route
    pub cors_policy: String,

    /// Authorization policy name attached to every route
    pub auth_policy: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(600),
            cors_policy: "default".to_string(),
            auth_policy: "OnlyThirdParties".to_string(),
        }
    }
}
