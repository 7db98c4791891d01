//! Credential store configuration

use serde::Deserialize;
use std::path::PathBuf;

/// Default SQLite database location
const DEFAULT_PATH: &str = "data/tollgate.db";

/// Default pool size
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Which persistence backend holds tenants, keys and counters
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite file (default)
    #[default]
    Sqlite,
    /// Process memory, lost on restart
    Memory,
}

/// Store configuration
///
/// ```toml
/// [store]
/// backend = "sqlite"
/// path = "/var/lib/tollgate/tollgate.db"
/// max_connections = 8
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend selection
    pub backend: StoreBackend,

    /// Database file (sqlite backend only)
    pub path: PathBuf,

    /// Connection pool size (sqlite backend only)
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from(DEFAULT_PATH),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}
