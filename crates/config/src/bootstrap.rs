//! First-run seeding configuration

use serde::Deserialize;

/// Key seeded when the store holds no API keys at all
///
/// ```toml
/// [bootstrap]
/// initial_key = "change-me"
/// initial_report_id = "change-me"
/// initial_role = "Manager"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Seeded key value
    pub initial_key: String,

    /// Seeded report id
    pub initial_report_id: String,

    /// Role granted to the seeded key
    pub initial_role: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            initial_key: "initialmanager".to_string(),
            initial_report_id: "initialmanager".to_string(),
            initial_role: "Manager".to_string(),
        }
    }
}
