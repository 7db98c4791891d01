//! Authentication error types
//!
//! A missing, unknown or disabled credential is not an error. Those are
//! `AuthOutcome` variants. Errors here mean the check itself could not run.

use thiserror::Error;
use tollgate_store::StoreError;

/// Result type for auth operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while resolving or administering API keys
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential store failure
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// Quota snapshot could not be serialized
    #[error("failed to serialize quota snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// A downstream header value contains bytes HTTP does not allow
    #[error("invalid value for header '{name}'")]
    InvalidHeaderValue {
        /// Header name
        name: &'static str,
    },
}

impl AuthError {
    /// Create an InvalidHeaderValue error
    pub fn invalid_header_value(name: &'static str) -> Self {
        Self::InvalidHeaderValue { name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_value() {
        let err = AuthError::invalid_header_value("x-department");
        assert!(err.to_string().contains("x-department"));
    }

    #[test]
    fn test_store_error_wraps() {
        let err: AuthError = StoreError::corrupt("roles", "k1", "bad json").into();
        assert!(err.to_string().starts_with("credential store error"));
        assert!(err.to_string().contains("roles"));
    }
}
