//! Per-request session lifecycle.
//!
//! For each request the middleware resolves a session key, loads and wraps
//! the stored session, attaches it to the context, runs the downstream
//! handler chain once, and persists whatever the handlers changed. Requests
//! without a key run the chain without touching the store.
//!
//! If the handler chain fails, nothing is written and the handler's error is
//! returned as is. The same holds when the request future is dropped before
//! it completes.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::collection::SessionCollection;
use crate::config::{DEFAULT_PROPERTY, SessionConfig};
use crate::context::SessionContext;
use crate::error::{Error, Result};
use crate::key::{KeyResolver, default_session_key};
use crate::store::{SaveOutcome, SessionStore};

/// Session middleware for a handler chain over contexts of type `Ctx`.
pub struct SessionMiddleware<Ctx, C> {
    store: Arc<SessionStore<C>>,
    property: String,
    key_resolver: KeyResolver<Ctx>,
}

impl<Ctx, C> SessionMiddleware<Ctx, C>
where
    Ctx: SessionContext + 'static,
    C: SessionCollection,
{
    /// Create a middleware with the default property name and key policy.
    pub fn new(store: SessionStore<C>) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    /// Create a middleware over a store shared with other components.
    pub fn with_shared_store(store: Arc<SessionStore<C>>) -> Self {
        Self {
            store,
            property: DEFAULT_PROPERTY.to_string(),
            key_resolver: Arc::new(default_session_key::<Ctx>),
        }
    }

    /// Create a middleware from configuration.
    ///
    /// `collection` must be the collection `config` names.
    pub fn from_config(collection: C, config: &SessionConfig) -> Result<Self> {
        let store = SessionStore::from_config(collection, config)?;
        Ok(Self::new(store).with_property(config.property.clone()))
    }
}

impl<Ctx, C> SessionMiddleware<Ctx, C>
where
    Ctx: SessionContext,
    C: SessionCollection,
{
    /// Set the property name the session is attached under.
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = property.into();
        self
    }

    /// Replace the key policy.
    pub fn with_key_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Ctx) -> Option<String> + Send + Sync + 'static,
    {
        self.key_resolver = Arc::new(resolver);
        self
    }

    /// The property name the session is attached under.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<SessionStore<C>> {
        &self.store
    }

    /// Resolve the session key for a context.
    pub fn resolve_key(&self, ctx: &Ctx) -> Option<String> {
        (self.key_resolver)(ctx)
    }

    /// Run `next` with the request's session attached to `ctx`.
    ///
    /// Store failures are converted into the handler's error type; handler
    /// errors pass through untouched and skip persistence.
    pub async fn handle<F, T, E>(&self, ctx: &mut Ctx, next: F) -> std::result::Result<T, E>
    where
        F: AsyncFnOnce(&mut Ctx) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let Some(key) = self.resolve_key(ctx) else {
            trace!(property = %self.property, "No session key, skipping session");
            return next(ctx).await;
        };

        let data = self.store.load(&key).await?;
        ctx.sessions_mut()
            .attach(self.property.clone(), self.store.track(data));

        let output = next(ctx).await?;

        let outcome = match ctx.sessions().get(&self.property) {
            Some(session) => self.store.save(&key, session).await?,
            None => {
                debug!(key = %key, property = %self.property, "Session detached by handler");
                self.store.delete(&key).await?;
                SaveOutcome::Deleted
            }
        };
        trace!(key = %key, ?outcome, "Session persisted");

        Ok(output)
    }
}

impl<Ctx, C> Clone for SessionMiddleware<Ctx, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            property: self.property.clone(),
            key_resolver: Arc::clone(&self.key_resolver),
        }
    }
}
