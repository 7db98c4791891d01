//! Tollgate Configuration
//!
//! TOML-based configuration for the gateway control plane. Every section
//! has defaults, so an empty file starts a working single-node setup backed
//! by `data/tollgate.db`.
//!
//! ```
//! use std::str::FromStr;
//! use tollgate_config::Config;
//!
//! let config = Config::from_str("[reconciler]\ninterval = \"30s\"").unwrap();
//! assert_eq!(config.reconciler.interval.as_secs(), 30);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [store]
//! path = "/var/lib/tollgate/tollgate.db"
//!
//! [gateway]
//! prefix_namespace = "prod"
//! reporting_base_url = "https://reports.example.com/usage/"
//!
//! [gateway.default_entry_points]
//! "/" = "api"
//!
//! [metering]
//! flush_interval = "5m"
//! period = "daily"
//! ```

mod auth;
mod bootstrap;
mod error;
mod gateway;
mod logging;
mod metering;
mod reconciler;
mod store;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use auth::AuthConfig;
pub use bootstrap::BootstrapConfig;
pub use error::{ConfigError, Result};
pub use gateway::GatewayConfig;
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use metering::{CounterPeriod, MeteringConfig};
pub use reconciler::ReconcilerConfig;
pub use store::{StoreBackend, StoreConfig};

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Persistence backend
    pub store: StoreConfig,

    /// Tenant naming and defaults
    pub gateway: GatewayConfig,

    /// Route reconciliation loop
    pub reconciler: ReconcilerConfig,

    /// API key cache
    pub auth: AuthConfig,

    /// Usage consolidation
    pub metering: MeteringConfig,

    /// First-run seed key
    pub bootstrap: BootstrapConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid TOML, or
    /// fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.reconciler.interval, Duration::from_secs(60));
        assert_eq!(config.reconciler.request_timeout, Duration::from_secs(600));
        assert_eq!(config.metering.flush_interval, Duration::from_secs(300));
        assert_eq!(config.metering.period, CounterPeriod::Daily);
        assert_eq!(config.auth.purge_batch_size, 10);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(
            config.gateway.default_entry_points.get("/").map(String::as_str),
            Some("api")
        );
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[log]
level = "debug"
format = "json"

[store]
backend = "memory"

[gateway]
namespace = "edge"
prefix_namespace = "prod"
reporting_base_url = "https://reports.example.com/"

[gateway.default_entry_points]
"/" = "api"
"/ocr/" = "ocr"

[reconciler]
interval = "15s"
request_timeout = "2m"
cors_policy = "strict"
auth_policy = "OnlyTrainers"

[auth]
cache_capacity = 500
purge_batch_size = 25
purge_interval = "10s"

[metering]
flush_interval = "1m"
period = "monthly"
pointer_ttl = "2m"

[bootstrap]
initial_key = "seed"
initial_report_id = "seed-report"
initial_role = "Manager"
"#;
        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.gateway.prefix_namespace.as_deref(), Some("prod"));
        assert_eq!(config.gateway.default_entry_points.len(), 2);
        assert_eq!(config.reconciler.interval, Duration::from_secs(15));
        assert_eq!(config.reconciler.auth_policy, "OnlyTrainers");
        assert_eq!(config.auth.cache_capacity, 500);
        assert_eq!(config.metering.period, CounterPeriod::Monthly);
        assert_eq!(config.bootstrap.initial_report_id, "seed-report");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_str("invalid { toml").is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = Config::from_str("[metering]\nflush_interval = \"0s\"").unwrap_err();
        assert!(err.to_string().contains("flush_interval"));
    }

    #[test]
    fn test_relative_entry_point_rejected() {
        let toml = r#"
[gateway.default_entry_points]
"ocr" = "ocr"
"#;
        let err = Config::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn test_uppercase_prefix_namespace_rejected() {
        let err = Config::from_str("[gateway]\nprefix_namespace = \"Prod\"").unwrap_err();
        assert!(err.to_string().contains("prefix_namespace"));
    }

    #[test]
    fn test_zero_purge_batch_rejected() {
        assert!(Config::from_str("[auth]\npurge_batch_size = 0").is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/tollgate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }

    #[test]
    fn test_sample_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../configs/tollgate.toml");
        let config = Config::from_file(path).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.reconciler.request_timeout.as_secs(), 600);
        assert_eq!(config.metering.period, CounterPeriod::Daily);
    }
}
