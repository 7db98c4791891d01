//! Configuration validation
//!
//! Rejects values that would make a background loop spin or generate
//! routes that can never validate.

use std::time::Duration;

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::store::StoreBackend;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_store(config)?;
    validate_gateway(config)?;
    validate_intervals(config)?;
    validate_auth(config)?;
    validate_bootstrap(config)?;
    Ok(())
}

fn validate_store(config: &Config) -> Result<()> {
    if config.store.backend == StoreBackend::Sqlite {
        if config.store.path.as_os_str().is_empty() {
            return Err(ConfigError::missing_field("store", "path"));
        }
        if config.store.max_connections == 0 {
            return Err(ConfigError::invalid_value(
                "store",
                "max_connections",
                "must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_gateway(config: &Config) -> Result<()> {
    let gateway = &config.gateway;

    if gateway.default_entry_points.is_empty() {
        return Err(ConfigError::missing_field("gateway", "default_entry_points"));
    }

    for (prefix, service) in &gateway.default_entry_points {
        if !prefix.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "gateway",
                "default_entry_points",
                format!("prefix '{prefix}' must start with '/'"),
            ));
        }
        if service.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "gateway",
                "default_entry_points",
                format!("prefix '{prefix}' has an empty service name"),
            ));
        }
    }

    if let Some(prefix) = &gateway.prefix_namespace
        && !is_dns_label(prefix)
    {
        return Err(ConfigError::invalid_value(
            "gateway",
            "prefix_namespace",
            format!("'{prefix}' must be lowercase ASCII letters, digits or '-'"),
        ));
    }

    Ok(())
}

fn validate_intervals(config: &Config) -> Result<()> {
    let checks: [(&'static str, &'static str, Duration); 5] = [
        ("reconciler", "interval", config.reconciler.interval),
        ("reconciler", "request_timeout", config.reconciler.request_timeout),
        ("metering", "flush_interval", config.metering.flush_interval),
        ("metering", "pointer_ttl", config.metering.pointer_ttl),
        ("auth", "purge_interval", config.auth.purge_interval),
    ];

    for (section, field, value) in checks {
        if value.is_zero() {
            return Err(ConfigError::invalid_value(section, field, "must be non-zero"));
        }
    }
    Ok(())
}

fn validate_auth(config: &Config) -> Result<()> {
    if config.auth.purge_batch_size == 0 {
        return Err(ConfigError::invalid_value(
            "auth",
            "purge_batch_size",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn validate_bootstrap(config: &Config) -> Result<()> {
    if config.bootstrap.initial_key.trim().is_empty() {
        return Err(ConfigError::missing_field("bootstrap", "initial_key"));
    }
    if config.bootstrap.initial_role.trim().is_empty() {
        return Err(ConfigError::missing_field("bootstrap", "initial_role"));
    }
    Ok(())
}

/// Lowercase DNS label: `[a-z0-9-]+`, not starting or ending with '-'
fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
