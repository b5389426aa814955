//! Session collection stored in a SQLite table.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use parley_session::{Changeset, SessionCollection, SessionConfig, SessionData, SessionRecord};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::error::{Result, SqliteError};

/// Session collection backed by one SQLite table.
///
/// The table is named after the collection and holds one row per session:
/// the key (primary key), the data as a JSON object, and the expiry in Unix
/// milliseconds. Expired rows are invisible to reads and updates; they are
/// physically removed by [`purge_expired`](Self::purge_expired), which the
/// host runs out of band.
///
/// Database calls run on tokio's blocking pool.
pub struct SqliteCollection {
    name: String,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCollection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SqliteCollection {
    /// Open or create a collection in the database at `path`.
    pub fn open(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let name = validate_name(name.into())?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        create_table(&conn, &name)?;

        info!(collection = %name, path = %path.display(), "SQLite session collection opened");
        Ok(Self {
            name,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open or create the collection `config` names in the database at `path`.
    pub fn open_with_config(path: impl AsRef<Path>, config: &SessionConfig) -> Result<Self> {
        Self::open(path, config.collection.clone())
    }

    /// Create a collection in a private in-memory database (useful for testing).
    pub fn open_in_memory(name: impl Into<String>) -> Result<Self> {
        let name = validate_name(name.into())?;
        let conn = Connection::open_in_memory()?;
        create_table(&conn, &name)?;

        debug!(collection = %name, "In-memory SQLite session collection created");
        Ok(Self {
            name,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or overwrite a record directly, bypassing changesets.
    pub async fn insert(&self, record: SessionRecord) -> Result<()> {
        self.with_conn(move |conn, table| {
            write_row(conn, table, &record.key, &record.data, record.expire_at)
        })
        .await
    }

    /// Number of stored rows, expired or not.
    pub async fn count(&self) -> Result<usize> {
        self.with_conn(|conn, table| {
            let count: i64 =
                conn.query_row(&format!(r#"SELECT COUNT(*) FROM "{table}""#), [], |row| {
                    row.get(0)
                })?;
            Ok(count as usize)
        })
        .await
    }

    /// Delete all expired rows, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let removed = self
            .with_conn(|conn, table| {
                let now = Utc::now().timestamp_millis();
                let removed = conn.execute(
                    &format!(r#"DELETE FROM "{table}" WHERE expire_at <= ?1"#),
                    params![now],
                )?;
                Ok(removed)
            })
            .await?;

        if removed > 0 {
            debug!(collection = %self.name, removed, "Purged expired sessions");
        }
        Ok(removed)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection, &str) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = self.name.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn, &table)
        })
        .await?
    }
}

#[async_trait]
impl SessionCollection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_one(&self, key: &str) -> parley_session::Result<Option<SessionRecord>> {
        let key = key.to_string();
        let record = self
            .with_conn(move |conn, table| find_live(conn, table, &key, Utc::now()))
            .await?;
        Ok(record)
    }

    async fn delete_one(&self, key: &str) -> parley_session::Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn, table| {
            conn.execute(
                &format!(r#"DELETE FROM "{table}" WHERE key = ?1"#),
                params![key],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn update_one(
        &self,
        key: &str,
        changeset: &Changeset,
        upsert: bool,
    ) -> parley_session::Result<()> {
        let key = key.to_string();
        let changeset = changeset.clone();
        self.with_conn(move |conn, table| {
            let tx = conn.transaction()?;

            let existing = find_live(&tx, table, &key, Utc::now())?;
            let mut data = match existing {
                Some(record) => record.data,
                None if upsert => SessionData::new(),
                None => return Ok(()),
            };
            changeset.apply_to(&mut data);

            write_row(&tx, table, &key, &data, changeset.expire_at)?;
            tx.commit()?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn ensure_indexes(&self) -> parley_session::Result<()> {
        // The key is the primary key, so only the expiry index is missing.
        self.with_conn(|conn, table| {
            conn.execute_batch(&format!(
                r#"CREATE INDEX IF NOT EXISTS "idx_{table}_expire_at" ON "{table}"(expire_at);"#
            ))?;
            Ok(())
        })
        .await?;
        debug!(collection = %self.name, "Expiry index ensured");
        Ok(())
    }
}

/// Collection names become table names, so only `[A-Za-z0-9_]` is allowed.
fn validate_name(name: String) -> Result<String> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(SqliteError::InvalidName(name))
    }
}

fn create_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            key TEXT PRIMARY KEY,
            data TEXT NOT NULL DEFAULT '{{}}',
            expire_at INTEGER NOT NULL
        );
        "#
    ))?;
    Ok(())
}

/// Fetch the row for `key` unless it has expired at `now`.
fn find_live(
    conn: &Connection,
    table: &str,
    key: &str,
    now: DateTime<Utc>,
) -> Result<Option<SessionRecord>> {
    let row = conn
        .query_row(
            &format!(r#"SELECT data, expire_at FROM "{table}" WHERE key = ?1 AND expire_at > ?2"#),
            params![key, now.timestamp_millis()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    let Some((raw, expire_at)) = row else {
        return Ok(None);
    };

    let data: SessionData = serde_json::from_str(&raw)?;
    let expire_at = DateTime::from_timestamp_millis(expire_at)
        .ok_or_else(|| SqliteError::InvalidData(format!("expire_at out of range: {expire_at}")))?;

    Ok(Some(SessionRecord {
        key: key.to_string(),
        data,
        expire_at,
    }))
}

fn write_row(
    conn: &Connection,
    table: &str,
    key: &str,
    data: &SessionData,
    expire_at: DateTime<Utc>,
) -> Result<()> {
    let raw = serde_json::to_string(data)?;
    conn.execute(
        &format!(
            r#"
            INSERT INTO "{table}" (key, data, expire_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET data = excluded.data, expire_at = excluded.expire_at
            "#
        ),
        params![key, raw, expire_at.timestamp_millis()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    use serde_json::{Value, json};

    fn changeset(set: &[(&str, Value)], unset: &[&str]) -> Changeset {
        Changeset {
            set: set
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            unset: unset.iter().map(|k| k.to_string()).collect::<BTreeSet<_>>(),
            expire_at: Utc::now() + chrono::Duration::seconds(3600),
        }
    }

    fn record(key: &str, data: Value, expire_at: DateTime<Utc>) -> SessionRecord {
        let Value::Object(data) = data else {
            panic!("test data must be an object");
        };
        SessionRecord {
            key: key.to_string(),
            data,
            expire_at,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        collection
            .update_one("1:2", &changeset(&[("name", json!("Ann"))], &[]), true)
            .await
            .unwrap();

        let found = collection.find_one("1:2").await.unwrap().unwrap();
        assert_eq!(found.key, "1:2");
        assert_eq!(Value::Object(found.data), json!({"name": "Ann"}));
    }

    #[tokio::test]
    async fn test_update_merges_and_unsets() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        collection
            .update_one(
                "k",
                &changeset(&[("a", json!(1)), ("b", json!({"nested": [1, 2]}))], &[]),
                true,
            )
            .await
            .unwrap();
        collection
            .update_one("k", &changeset(&[("c", json!(true))], &["a"]), true)
            .await
            .unwrap();

        let found = collection.find_one("k").await.unwrap().unwrap();
        assert_eq!(
            Value::Object(found.data),
            json!({"b": {"nested": [1, 2]}, "c": true})
        );
    }

    #[tokio::test]
    async fn test_update_without_upsert_skips_missing() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        collection
            .update_one("k", &changeset(&[("a", json!(1))], &[]), false)
            .await
            .unwrap();
        assert_eq!(collection.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expiry_is_stored() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        let cs = changeset(&[("a", json!(1))], &[]);
        collection.update_one("k", &cs, true).await.unwrap();

        let found = collection.find_one("k").await.unwrap().unwrap();
        assert_eq!(
            found.expire_at.timestamp_millis(),
            cs.expire_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        collection
            .update_one("k", &changeset(&[("a", json!(1))], &[]), true)
            .await
            .unwrap();

        collection.delete_one("k").await.unwrap();
        collection.delete_one("k").await.unwrap();
        assert!(collection.find_one("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_rows_are_hidden_and_purged() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        let past = Utc::now() - chrono::Duration::seconds(5);
        let future = Utc::now() + chrono::Duration::seconds(60);
        collection
            .insert(record("old", json!({"a": 1}), past))
            .await
            .unwrap();
        collection
            .insert(record("new", json!({"a": 2}), future))
            .await
            .unwrap();

        assert!(collection.find_one("old").await.unwrap().is_none());
        assert_eq!(collection.count().await.unwrap(), 2);

        assert_eq!(collection.purge_expired().await.unwrap(), 1);
        assert_eq!(collection.count().await.unwrap(), 1);
        assert!(collection.find_one("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upsert_over_expired_starts_fresh() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        let past = Utc::now() - chrono::Duration::seconds(5);
        collection
            .insert(record("k", json!({"stale": true}), past))
            .await
            .unwrap();

        collection
            .update_one("k", &changeset(&[("fresh", json!(true))], &[]), true)
            .await
            .unwrap();

        let found = collection.find_one("k").await.unwrap().unwrap();
        assert_eq!(Value::Object(found.data), json!({"fresh": true}));
    }

    #[tokio::test]
    async fn test_ensure_indexes_is_repeatable() {
        let collection = SqliteCollection::open_in_memory("bot_sessions").unwrap();
        collection.ensure_indexes().await.unwrap();
        collection.ensure_indexes().await.unwrap();

        let conn = collection.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_bot_sessions_expire_at'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_invalid_name_rejected() {
        for name in ["", "sessions; DROP TABLE x", "bad-name", "quote\"d"] {
            let result = SqliteCollection::open_in_memory(name);
            assert!(matches!(result, Err(SqliteError::InvalidName(_))), "{name}");
        }
    }

    #[tokio::test]
    async fn test_corrupt_data_surfaces_error() {
        let collection = SqliteCollection::open_in_memory("sessions").unwrap();
        {
            let conn = collection.conn.lock();
            conn.execute(
                "INSERT INTO sessions (key, data, expire_at) VALUES ('k', 'not json', ?1)",
                params![Utc::now().timestamp_millis() + 60_000],
            )
            .unwrap();
        }

        let result = collection.find_one("k").await;
        assert!(matches!(result, Err(parley_session::Error::Serialization(_))));
    }

    #[test]
    fn test_open_with_config_uses_collection_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig::new().with_collection("bot_sessions");
        let collection =
            SqliteCollection::open_with_config(dir.path().join("sessions.db"), &config).unwrap();

        assert_eq!(collection.name(), "bot_sessions");
        let conn = collection.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'bot_sessions'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("sessions.db");

        {
            let collection = SqliteCollection::open(&path, "sessions").unwrap();
            collection
                .update_one("k", &changeset(&[("name", json!("Ann"))], &[]), true)
                .await
                .unwrap();
        }

        let collection = SqliteCollection::open(&path, "sessions").unwrap();
        let found = collection.find_one("k").await.unwrap().unwrap();
        assert_eq!(found.data["name"], json!("Ann"));
    }
}
