//! SQLite-backed session collection for Parley.
//!
//! [`SqliteCollection`] stores each session as a row keyed by its session
//! key, with the data serialized as a JSON object and the expiry held in
//! Unix milliseconds. It implements [`parley_session::SessionCollection`],
//! so it plugs straight into a [`parley_session::SessionStore`]:
//!
//! ```no_run
//! use std::time::Duration;
//! use parley_session::SessionStore;
//! use parley_sqlite::SqliteCollection;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = SqliteCollection::open("data/sessions.db", "sessions")?;
//! let store = SessionStore::new(collection, Duration::from_secs(3600));
//! store.setup().await?;
//! # Ok(())
//! # }
//! ```

mod collection;
mod error;

pub use collection::SqliteCollection;
pub use error::{Result, SqliteError};
