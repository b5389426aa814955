//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use parley_session::{
    Changeset, Error, MemoryCollection, Result, SessionCollection, SessionContext,
    SessionMiddleware, SessionRecord, SessionStore, Sessions,
};

/// A chat update as a host framework would hand it to the middleware.
#[derive(Debug, Default)]
pub struct TestUpdate {
    pub chat: Option<i64>,
    pub from: Option<i64>,
    pub sessions: Sessions,
}

impl TestUpdate {
    /// An update from user `from` in chat `chat`.
    pub fn new(chat: i64, from: i64) -> Self {
        Self {
            chat: Some(chat),
            from: Some(from),
            ..Default::default()
        }
    }

    /// An update with no chat or sender, e.g. an inline query result.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl SessionContext for TestUpdate {
    fn chat_id(&self) -> Option<String> {
        self.chat.map(|id| id.to_string())
    }

    fn sender_id(&self) -> Option<String> {
        self.from.map(|id| id.to_string())
    }

    fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    fn sessions_mut(&mut self) -> &mut Sessions {
        &mut self.sessions
    }
}

/// A call made against the backing collection.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Find(String),
    Delete(String),
    Update {
        key: String,
        changeset: Changeset,
        upsert: bool,
    },
}

impl StoreOp {
    pub fn is_write(&self) -> bool {
        !matches!(self, StoreOp::Find(_))
    }
}

/// In-memory collection that records every call made to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingCollection {
    pub inner: MemoryCollection,
    ops: Arc<Mutex<Vec<StoreOp>>>,
}

impl RecordingCollection {
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<StoreOp> {
        self.ops().into_iter().filter(StoreOp::is_write).collect()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// The stored record for `key`; panics if there is none.
    pub async fn stored(&self, key: &str) -> SessionRecord {
        self.inner
            .find_one(key)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no record stored for {key}"))
    }

    fn log(&self, op: StoreOp) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl SessionCollection for RecordingCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_one(&self, key: &str) -> Result<Option<SessionRecord>> {
        self.log(StoreOp::Find(key.to_string()));
        self.inner.find_one(key).await
    }

    async fn delete_one(&self, key: &str) -> Result<()> {
        self.log(StoreOp::Delete(key.to_string()));
        self.inner.delete_one(key).await
    }

    async fn update_one(&self, key: &str, changeset: &Changeset, upsert: bool) -> Result<()> {
        self.log(StoreOp::Update {
            key: key.to_string(),
            changeset: changeset.clone(),
            upsert,
        });
        self.inner.update_one(key, changeset, upsert).await
    }

    async fn ensure_indexes(&self) -> Result<()> {
        self.inner.ensure_indexes().await
    }
}

/// Collection whose reads and/or writes fail as if the store were down.
#[derive(Debug, Clone, Default)]
pub struct FailingCollection {
    pub inner: MemoryCollection,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl FailingCollection {
    fn unavailable() -> Error {
        Error::StoreUnavailable("connection refused".to_string())
    }
}

#[async_trait]
impl SessionCollection for FailingCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find_one(&self, key: &str) -> Result<Option<SessionRecord>> {
        if self.fail_reads {
            return Err(Self::unavailable());
        }
        self.inner.find_one(key).await
    }

    async fn delete_one(&self, key: &str) -> Result<()> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.inner.delete_one(key).await
    }

    async fn update_one(&self, key: &str, changeset: &Changeset, upsert: bool) -> Result<()> {
        if self.fail_writes {
            return Err(Self::unavailable());
        }
        self.inner.update_one(key, changeset, upsert).await
    }

    async fn ensure_indexes(&self) -> Result<()> {
        Ok(())
    }
}

pub const TTL: Duration = Duration::from_secs(3600);

/// Middleware over a recording collection with a 1 hour TTL.
pub fn recording_middleware() -> (
    SessionMiddleware<TestUpdate, RecordingCollection>,
    RecordingCollection,
) {
    let collection = RecordingCollection::default();
    let middleware = SessionMiddleware::new(SessionStore::new(collection.clone(), TTL));
    (middleware, collection)
}

/// Install a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("parley_session=trace"))
            .with_test_writer()
            .try_init();
    });
}
