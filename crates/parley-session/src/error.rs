//! Error types for session operations.

/// Error type for session load/save operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing store rejected the request or could not be reached.
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored record could not be decoded into a session mapping.
    #[error("Invalid session record: {0}")]
    InvalidRecord(String),

    /// A value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration was missing or malformed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading session configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse session config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value the session layer cannot work with.
    #[error("invalid session config: {0}")]
    Invalid(String),
}
