//! Gateway naming and tenant defaults
//!
//! These values shape every generated route and cluster:
//!
//! - `prefix_namespace` is inserted in front of the tenant id when
//!   building backend host names (`http://{service}.{prefix}-{tenant}`)
//! - `default_entry_points` is used for tenants that declare none
//! - `reporting_base_url` prefixes the report id in the `x-reporting` header

use serde::Deserialize;
use std::collections::BTreeMap;

/// Gateway configuration
///
/// ```toml
/// [gateway]
/// namespace = "gateway"
/// prefix_namespace = "prod"
/// reporting_base_url = "https://reports.example.com/usage/"
///
/// [gateway.default_entry_points]
/// "/" = "api"
/// "/ocr" = "ocr"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Namespace the gateway itself runs in
    pub namespace: String,

    /// Optional prefix for tenant backend namespaces
    pub prefix_namespace: Option<String>,

    /// Base URL for the downstream `x-reporting` header
    pub reporting_base_url: String,

    /// Prefix → backend service used for tenants without entry points
    pub default_entry_points: BTreeMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            namespace: "gateway".to_string(),
            prefix_namespace: None,
            reporting_base_url: String::new(),
            default_entry_points: BTreeMap::from([("/".to_string(), "api".to_string())]),
        }
    }
}
