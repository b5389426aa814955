//! Configuration for the session layer.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default name under which the session is exposed on a request context.
pub const DEFAULT_PROPERTY: &str = "session";

/// Default name of the collection holding session records.
pub const DEFAULT_COLLECTION: &str = "sessions";

/// Default time-to-live for a saved session (1 hour).
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Configuration for the session middleware and store.
///
/// The key resolver is not part of this struct since it is code, not data;
/// override it on [`SessionMiddleware`](crate::SessionMiddleware) instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name under which the session is exposed on the request context.
    pub property: String,

    /// Name of the collection holding session records.
    pub collection: String,

    /// Seconds a saved session lives before the store may expire it.
    #[serde(rename = "ttl")]
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            property: DEFAULT_PROPERTY.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// Wrapper accepting a `[session]` table in a larger config file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    session: Option<SessionConfig>,
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context property name.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = property.into();
        self
    }

    /// Set the collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Set the session TTL.
    ///
    /// Sub-second precision is dropped; the TTL is stored in whole seconds.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    /// The session TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.property.trim().is_empty() {
            return Err(ConfigError::Invalid("property must not be empty".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::Invalid("collection must not be empty".into()));
        }
        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid("ttl must be greater than zero".into()));
        }
        Ok(())
    }

    /// Parse configuration from TOML.
    ///
    /// Accepts either a bare table of session fields or a document with a
    /// `[session]` table. Missing fields take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let value: toml::Table = toml::from_str(input)?;
        let config = if value.contains_key("session") {
            let file: ConfigFile = toml::from_str(input)?;
            file.session.unwrap_or_default()
        } else {
            toml::from_str(input)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}
