//! Loading and saving tracked sessions.

use std::time::Duration;

use tracing::{debug, trace};

use crate::collection::SessionCollection;
use crate::config::SessionConfig;
use crate::error::{ConfigError, Result};
use crate::tracker::TrackedSession;
use crate::value::SessionData;

/// What a call to [`SessionStore::save`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The session was empty and its record was deleted.
    Deleted,
    /// Nothing changed; the store was not touched.
    Unchanged,
    /// The changeset was upserted with a refreshed expiry.
    Updated,
}

/// Session store over a backing collection.
///
/// Holds no session state of its own: every `load` and `save` goes to the
/// collection.
#[derive(Debug)]
pub struct SessionStore<C> {
    collection: C,
    ttl: Duration,
}

impl<C: SessionCollection> SessionStore<C> {
    /// Create a store whose saved sessions live for `ttl`.
    pub fn new(collection: C, ttl: Duration) -> Self {
        Self { collection, ttl }
    }

    /// Create a store using the TTL from `config`.
    ///
    /// Fails if `collection` is not the collection `config` names.
    pub fn from_config(collection: C, config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        if collection.name() != config.collection {
            return Err(ConfigError::Invalid(format!(
                "collection '{}' does not match configured collection '{}'",
                collection.name(),
                config.collection
            ))
            .into());
        }
        Ok(Self::new(collection, config.ttl()))
    }

    /// The backing collection.
    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// The TTL applied on save.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Provision the collection's indexes.
    pub async fn setup(&self) -> Result<()> {
        self.collection.ensure_indexes().await?;
        debug!(collection = %self.collection.name(), "Session indexes ensured");
        Ok(())
    }

    /// Wrap a loaded mapping for change tracking.
    pub fn track(&self, data: SessionData) -> TrackedSession {
        TrackedSession::new(data, self.ttl)
    }

    /// Load the session data for `key`, or an empty mapping if none exists.
    pub async fn load(&self, key: &str) -> Result<SessionData> {
        match self.collection.find_one(key).await? {
            Some(record) => {
                trace!(key = %key, fields = record.data.len(), "Session loaded");
                Ok(record.data)
            }
            None => {
                trace!(key = %key, "No stored session, starting empty");
                Ok(SessionData::new())
            }
        }
    }

    /// Persist a tracked session.
    ///
    /// An empty session deletes the record. A clean session is left alone,
    /// which also means its expiry is not refreshed. Otherwise the changeset
    /// is upserted with expiry `now + ttl`.
    pub async fn save(&self, key: &str, session: &TrackedSession) -> Result<SaveOutcome> {
        if session.is_empty() {
            self.delete(key).await?;
            return Ok(SaveOutcome::Deleted);
        }

        if !session.is_dirty() {
            trace!(key = %key, "Session unchanged, skipping save");
            return Ok(SaveOutcome::Unchanged);
        }

        let changeset = session.changeset();
        self.collection.update_one(key, &changeset, true).await?;
        debug!(
            key = %key,
            set = changeset.set.len(),
            unset = changeset.unset.len(),
            expire_at = %changeset.expire_at,
            "Session saved"
        );
        Ok(SaveOutcome::Updated)
    }

    /// Delete the record for `key`. Deleting a missing session succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        debug!(key = %key, "Deleting session");
        self.collection.delete_one(key).await
    }
}
