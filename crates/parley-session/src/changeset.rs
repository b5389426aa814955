//! Incremental updates for session records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::value::SessionData;

/// Name of the record field holding session data.
pub const DATA_FIELD: &str = "data";

/// Name of the record field holding the expiry timestamp.
pub const EXPIRE_AT_FIELD: &str = "expireAt";

/// The minimal set of field operations accumulated since a session was loaded.
///
/// A field appears in at most one of `set` and `unset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    /// Fields to assign, by field name within the session data.
    pub set: BTreeMap<String, Value>,

    /// Fields to remove, by field name within the session data.
    pub unset: BTreeSet<String>,

    /// Refreshed expiry for the record.
    pub expire_at: DateTime<Utc>,
}

impl Changeset {
    /// Whether the changeset touches no data fields (it always refreshes expiry).
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Apply the field operations to a session mapping.
    pub fn apply_to(&self, data: &mut SessionData) {
        for field in &self.unset {
            data.remove(field);
        }
        for (field, value) in &self.set {
            data.insert(field.clone(), value.clone());
        }
    }

    /// Render as a document-store update: `{"$set": ..., "$unset": ...}`.
    ///
    /// Data fields are addressed by dotted path (`data.<field>`) and `$unset`
    /// is omitted when nothing is removed. The expiry under `expireAt` is an
    /// Extended JSON date (`{"$date": "<RFC 3339>"}`), so a driver decodes it
    /// as a date value that a TTL index can act on.
    pub fn to_update_document(&self) -> Value {
        let mut set = Map::new();
        for (field, value) in &self.set {
            set.insert(data_path(field), value.clone());
        }
        set.insert(
            EXPIRE_AT_FIELD.to_string(),
            json!({ "$date": self.expire_at.to_rfc3339_opts(SecondsFormat::Millis, true) }),
        );

        let mut update = Map::new();
        update.insert("$set".to_string(), Value::Object(set));
        if !self.unset.is_empty() {
            let unset: Map<String, Value> = self
                .unset
                .iter()
                .map(|field| (data_path(field), json!("")))
                .collect();
            update.insert("$unset".to_string(), Value::Object(unset));
        }
        Value::Object(update)
    }
}

/// Dotted path addressing a field inside the record's data.
pub fn data_path(field: &str) -> String {
    format!("{DATA_FIELD}.{field}")
}
