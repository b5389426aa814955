//! Per-conversation sessions for message-handling middleware chains.
//!
//! This crate attaches a mutable session to each inbound request and writes
//! back only what the request changed:
//! - Change tracking with structural equality, so no-op writes are free
//! - Incremental `$set`/`$unset` changesets with a refreshed expiry
//! - Empty sessions delete their record instead of storing `{}`
//! - A pluggable backing collection (in-memory here, SQLite in `parley-sqlite`)
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_session::{MemoryCollection, SessionConfig, SessionMiddleware};
//!
//! let config = SessionConfig::default().with_ttl(Duration::from_secs(1800));
//! let sessions = SessionMiddleware::from_config(MemoryCollection::from_config(&config), &config)?;
//! sessions.store().setup().await?;
//!
//! sessions
//!     .handle(&mut update, async |ctx: &mut Update| {
//!         let session = ctx.sessions_mut().get_mut("session").unwrap();
//!         session.set("step", "checkout");
//!         Ok::<_, anyhow::Error>(())
//!     })
//!     .await?;
//! ```

mod changeset;
mod collection;
mod config;
mod context;
mod error;
mod key;
mod memory;
mod middleware;
mod store;
mod tracker;
mod ttl;
mod value;

pub use changeset::{Changeset, DATA_FIELD, EXPIRE_AT_FIELD, data_path};
pub use collection::{SessionCollection, SessionRecord};
pub use config::{DEFAULT_COLLECTION, DEFAULT_PROPERTY, DEFAULT_TTL_SECS, SessionConfig};
pub use context::{SessionContext, Sessions};
pub use error::{ConfigError, Error, Result};
pub use key::{KeyResolver, default_session_key};
pub use memory::MemoryCollection;
pub use middleware::SessionMiddleware;
pub use store::{SaveOutcome, SessionStore};
pub use tracker::TrackedSession;
pub use ttl::{expiry_from, is_expired};
pub use value::{SessionData, deep_equal, maps_equal};
