//! Config sections mapped onto component settings

use tollgate_config::{BootstrapConfig, Config, CounterPeriod, MeteringConfig};
use tollgate_metering::{BootstrapSettings, MeteringSettings, Period};
use tollgate_routing::ReconcilerSettings;

/// Reconciler settings from the `[gateway]` and `[reconciler]` sections
pub fn reconciler_settings(config: &Config) -> ReconcilerSettings {
    ReconcilerSettings {
        interval: config.reconciler.interval,
        request_timeout: config.reconciler.request_timeout,
        cors_policy: config.reconciler.cors_policy.clone(),
        auth_policy: config.reconciler.auth_policy.clone(),
        prefix_namespace: config.gateway.prefix_namespace.clone(),
        default_entry_points: config.gateway.default_entry_points.clone(),
    }
}

/// Counter granularity
pub fn period(period: CounterPeriod) -> Period {
    match period {
        CounterPeriod::Daily => Period::Daily,
        CounterPeriod::Weekly => Period::Weekly,
        CounterPeriod::Monthly => Period::Monthly,
    }
}

/// Consolidation worker settings from `[metering]`
pub fn metering_settings(config: &MeteringConfig) -> MeteringSettings {
    MeteringSettings {
        flush_interval: config.flush_interval,
        period: period(config.period),
        pointer_ttl: config.pointer_ttl,
    }
}

/// Seed key from `[bootstrap]`
pub fn bootstrap_settings(config: &BootstrapConfig) -> BootstrapSettings {
    BootstrapSettings {
        initial_key: config.initial_key.clone(),
        initial_report_id: config.initial_report_id.clone(),
        initial_role: config.initial_role.clone(),
    }
}
