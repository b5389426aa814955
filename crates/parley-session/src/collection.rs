//! Backing collection for session records.
//!
//! This module defines the trait that decouples the session store from a
//! specific document store. Backends only need keyed lookup, keyed delete,
//! and an upserting update that applies a [`Changeset`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::changeset::Changeset;
use crate::error::Result;
use crate::value::SessionData;

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session key.
    pub key: String,

    /// Session contents.
    #[serde(default)]
    pub data: SessionData,

    /// When the backing store may discard the record.
    #[serde(rename = "expireAt")]
    pub expire_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create an empty record that expires at `expire_at`.
    pub fn new(key: impl Into<String>, expire_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            data: SessionData::new(),
            expire_at,
        }
    }

    /// Apply a changeset, including its refreshed expiry.
    pub fn apply(&mut self, changeset: &Changeset) {
        changeset.apply_to(&mut self.data);
        self.expire_at = changeset.expire_at;
    }
}

/// A collection of session records keyed by session key.
///
/// Implementations surface connectivity or backend failures as
/// [`Error::StoreUnavailable`](crate::Error::StoreUnavailable); a missing
/// record is never an error.
#[async_trait]
pub trait SessionCollection: Send + Sync {
    /// Name of the collection.
    fn name(&self) -> &str;

    /// Find the record for `key`.
    async fn find_one(&self, key: &str) -> Result<Option<SessionRecord>>;

    /// Delete the record for `key`. Deleting a missing record succeeds.
    async fn delete_one(&self, key: &str) -> Result<()>;

    /// Apply `changeset` to the record for `key`.
    ///
    /// With `upsert`, a missing record is created first; without it, a
    /// missing record is left alone.
    async fn update_one(&self, key: &str, changeset: &Changeset, upsert: bool) -> Result<()>;

    /// Create the key lookup index and the expiry index.
    ///
    /// Called once during setup; must be safe to call again.
    async fn ensure_indexes(&self) -> Result<()>;
}
