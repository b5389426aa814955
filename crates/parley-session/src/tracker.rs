//! Change tracking over a loaded session mapping.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::changeset::Changeset;
use crate::error::Result;
use crate::ttl::expiry_from;
use crate::value::{SessionData, deep_equal};

/// A session mapping that records every mutation made to it.
///
/// Reads pass straight through. Writes and deletes update the visible
/// contents exactly as a plain map would, and additionally accumulate a
/// [`Changeset`] and a dirty flag:
///
/// - `set` marks the session dirty only when the new value differs
///   structurally from the stored one, but always records the assignment;
/// - `delete` always marks the session dirty, even for a missing field;
/// - once dirty, a session stays dirty until it is dropped.
#[derive(Debug, Clone)]
pub struct TrackedSession {
    data: SessionData,
    pending_set: BTreeMap<String, Value>,
    pending_unset: BTreeSet<String>,
    dirty: bool,
    ttl: Duration,
}

impl TrackedSession {
    /// Wrap a loaded mapping. The session starts clean.
    pub fn new(data: SessionData, ttl: Duration) -> Self {
        Self {
            data,
            pending_set: BTreeMap::new(),
            pending_unset: BTreeSet::new(),
            dirty: false,
            ttl,
        }
    }

    /// Get a field's value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Get a field's value deserialized into `T`.
    ///
    /// Returns `Ok(None)` if the field is absent.
    pub fn get_as<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
        match self.data.get(field) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    /// Check whether a field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    /// Number of fields in the session.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the session has no fields.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over the field names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Assign a field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();

        let unchanged = self
            .data
            .get(&field)
            .is_some_and(|current| deep_equal(current, &value));
        if !unchanged {
            self.dirty = true;
        }

        self.pending_unset.remove(&field);
        self.pending_set.insert(field.clone(), value.clone());
        self.data.insert(field, value);
    }

    /// Assign a field from any serializable value.
    pub fn set_serialized<T: Serialize + ?Sized>(
        &mut self,
        field: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(field, value);
        Ok(())
    }

    /// Modify a field in place through a closure.
    ///
    /// The closure sees the current value (or `null` when absent); the result
    /// is written back through [`set`](Self::set), so an edit that leaves the
    /// value unchanged does not dirty the session.
    pub fn update<F>(&mut self, field: impl Into<String>, f: F)
    where
        F: FnOnce(&mut Value),
    {
        let field = field.into();
        let mut value = self.data.get(&field).cloned().unwrap_or(Value::Null);
        f(&mut value);
        self.set(field, value);
    }

    /// Remove a field, returning its previous value.
    pub fn delete(&mut self, field: &str) -> Option<Value> {
        self.dirty = true;
        self.pending_set.remove(field);
        self.pending_unset.insert(field.to_string());
        self.data.remove(field)
    }

    /// Replace the whole contents with `data`.
    ///
    /// The replacement is diffed field by field against the current contents
    /// with the same rules as [`set`](Self::set) and [`delete`](Self::delete):
    /// equal fields do not dirty the session, changed, new, and removed
    /// fields do. The changeset afterwards assigns every field of `data` and
    /// removes every field the old contents had that `data` lacks. Earlier
    /// mutations in the same request keep the session dirty.
    pub fn replace(&mut self, data: SessionData) {
        let previous = std::mem::take(&mut self.data);

        let mut dirty = self.dirty;
        let mut unset = std::mem::take(&mut self.pending_unset);
        for field in previous.keys() {
            if !data.contains_key(field) {
                dirty = true;
                unset.insert(field.clone());
            }
        }
        unset.retain(|field| !data.contains_key(field));

        let mut set = BTreeMap::new();
        for (field, value) in &data {
            let unchanged = previous
                .get(field)
                .is_some_and(|current| deep_equal(current, value));
            if !unchanged {
                dirty = true;
            }
            set.insert(field.clone(), value.clone());
        }

        self.data = data;
        self.pending_set = set;
        self.pending_unset = unset;
        self.dirty = dirty;
    }

    /// Whether any real mutation happened since the session was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The current contents.
    pub fn raw_view(&self) -> &SessionData {
        &self.data
    }

    /// Consume the session, returning its contents.
    pub fn into_data(self) -> SessionData {
        self.data
    }

    /// The TTL applied when the session is saved.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build the changeset with an expiry of `now + ttl`.
    ///
    /// The expiry is included regardless of the dirty flag; whether the
    /// changeset is written at all is the store's decision.
    pub fn changeset(&self) -> Changeset {
        self.changeset_at(Utc::now())
    }

    /// Build the changeset with an expiry relative to `now`.
    pub fn changeset_at(&self, now: DateTime<Utc>) -> Changeset {
        Changeset {
            set: self.pending_set.clone(),
            unset: self.pending_unset.clone(),
            expire_at: expiry_from(now, self.ttl),
        }
    }
}
