//! Command implementations for the tollgate CLI

pub mod routes;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tollgate_config::Config;

/// Load configuration
///
/// An explicit path must exist. Without one, `configs/tollgate.toml` and
/// `tollgate.toml` are tried before falling back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path).context("failed to load configuration");
    }

    let default_paths = [
        PathBuf::from("configs/tollgate.toml"),
        PathBuf::from("tollgate.toml"),
    ];
    for path in &default_paths {
        if path.exists() {
            return Config::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()));
        }
    }

    Ok(Config::default())
}
