//! Error types for the SQLite collection.

use thiserror::Error;

/// Errors that can occur in the SQLite collection.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to prepare the database location.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored session data is not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The collection name cannot be used as a table name.
    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    /// A stored row holds a value that cannot be decoded.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The blocking database task failed to complete.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for SQLite collection operations.
pub type Result<T> = std::result::Result<T, SqliteError>;

impl From<SqliteError> for parley_session::Error {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::Serialization(e) => parley_session::Error::Serialization(e),
            SqliteError::InvalidData(msg) => parley_session::Error::InvalidRecord(msg),
            SqliteError::InvalidName(name) => parley_session::Error::Config(
                parley_session::ConfigError::Invalid(format!("collection name '{name}'")),
            ),
            other => parley_session::Error::StoreUnavailable(other.to_string()),
        }
    }
}
