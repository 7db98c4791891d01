//! Store error types

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a credential store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQL execution or connection failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A JSON column could not be encoded or decoded
    #[error("failed to encode column: {0}")]
    Encoding(#[from] serde_json::Error),

    /// A stored value does not have the expected shape
    #[error("corrupt {column} in row '{row}': {message}")]
    Corrupt {
        /// Column name
        column: &'static str,
        /// Primary key of the row
        row: String,
        /// Error message
        message: String,
    },

    /// The database directory could not be created
    #[error("failed to prepare database directory '{path}': {source}")]
    Directory {
        /// Directory path
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create a Corrupt error
    pub fn corrupt(column: &'static str, row: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            column,
            row: row.into(),
            message: message.into(),
        }
    }
}
