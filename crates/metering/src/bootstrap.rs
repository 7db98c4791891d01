//! First-run seeding

use tollgate_store::{ApiKeyRecord, CredentialStore};
use tracing::{debug, info};

use crate::error::Result;

/// Key seeded into an empty store
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    /// Seeded key value
    pub initial_key: String,
    /// Seeded report id, none when empty
    pub initial_report_id: String,
    /// Role granted to the seeded key
    pub initial_role: String,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            initial_key: "initialmanager".to_string(),
            initial_report_id: "initialmanager".to_string(),
            initial_role: "Manager".to_string(),
        }
    }
}

/// Prepare the store for first use
///
/// Creates the schema, then seeds one enabled key if the store holds no
/// API keys at all. Once any key exists this never seeds again. Returns
/// whether a key was seeded.
pub async fn bootstrap(store: &dyn CredentialStore, settings: &BootstrapSettings) -> Result<bool> {
    store.ensure_schema().await?;

    if store.has_api_keys().await? {
        debug!("api keys present, skipping seed");
        return Ok(false);
    }

    let mut record = ApiKeyRecord::new(&settings.initial_key).with_role(&settings.initial_role);
    if !settings.initial_report_id.is_empty() {
        record = record.with_report_id(&settings.initial_report_id);
    }
    store.upsert_api_keys(&[record]).await?;

    info!(role = %settings.initial_role, "store empty, seeded initial api key");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_store::MemoryStore;

    #[tokio::test]
    async fn test_seeds_empty_store_once() {
        let store = MemoryStore::new();
        let settings = BootstrapSettings::default();

        assert!(bootstrap(&store, &settings).await.unwrap());
        assert!(!bootstrap(&store, &settings).await.unwrap());

        let seeded = store.get_api_key("initialmanager").await.unwrap().unwrap();
        assert!(seeded.enabled);
        assert!(seeded.has_role("Manager"));
        assert_eq!(seeded.report_id.as_deref(), Some("initialmanager"));
    }

    #[tokio::test]
    async fn test_existing_key_prevents_seed() {
        let store = MemoryStore::new();
        store
            .upsert_api_keys(&[ApiKeyRecord::new("existing").with_enabled(false)])
            .await
            .unwrap();

        assert!(!bootstrap(&store, &BootstrapSettings::default()).await.unwrap());
        assert!(store.get_api_key("initialmanager").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_report_id_not_set() {
        let store = MemoryStore::new();
        let settings = BootstrapSettings {
            initial_key: "root".into(),
            initial_report_id: String::new(),
            initial_role: "Manager".into(),
        };
        bootstrap(&store, &settings).await.unwrap();
        assert_eq!(store.get_api_key("root").await.unwrap().unwrap().report_id, None);
    }
}
