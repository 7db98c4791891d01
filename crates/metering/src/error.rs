//! Metering error types

use thiserror::Error;
use tollgate_auth::AuthError;
use tollgate_store::StoreError;

/// Result type for metering operations
pub type Result<T> = std::result::Result<T, MeteringError>;

/// Errors that can occur while consolidating or querying usage
#[derive(Debug, Error)]
pub enum MeteringError {
    /// Credential store failure
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// Report id resolution through the key cache failed
    #[error("api key resolution failed: {0}")]
    Auth(#[from] AuthError),
}
