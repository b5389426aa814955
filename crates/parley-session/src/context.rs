//! Request-scoped access to sessions.

use std::collections::HashMap;

use crate::tracker::TrackedSession;
use crate::value::SessionData;

/// Sessions attached to one request, keyed by property name.
///
/// Several session middlewares can share a context as long as they use
/// different property names.
#[derive(Debug, Default)]
pub struct Sessions {
    slots: HashMap<String, TrackedSession>,
}

impl Sessions {
    /// Create an empty set of sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// The session attached under `property`.
    pub fn get(&self, property: &str) -> Option<&TrackedSession> {
        self.slots.get(property)
    }

    /// Mutable access to the session attached under `property`.
    ///
    /// Mutations go through [`TrackedSession`] and are tracked.
    pub fn get_mut(&mut self, property: &str) -> Option<&mut TrackedSession> {
        self.slots.get_mut(property)
    }

    /// Check whether a session is attached under `property`.
    pub fn contains(&self, property: &str) -> bool {
        self.slots.contains_key(property)
    }

    /// Attach a session, returning any session it displaced.
    pub fn attach(
        &mut self,
        property: impl Into<String>,
        session: TrackedSession,
    ) -> Option<TrackedSession> {
        self.slots.insert(property.into(), session)
    }

    /// Detach the session under `property`.
    ///
    /// A session detached during handling is persisted as empty, which
    /// deletes its record.
    pub fn detach(&mut self, property: &str) -> Option<TrackedSession> {
        self.slots.remove(property)
    }

    /// Replace the contents of the session under `property`.
    ///
    /// Returns `false` if no session is attached, e.g. because the request
    /// carried no session key.
    pub fn assign(&mut self, property: &str, data: SessionData) -> bool {
        match self.slots.get_mut(property) {
            Some(session) => {
                session.replace(data);
                true
            }
            None => false,
        }
    }
}

/// A request context the session middleware can work with.
///
/// The identity accessors feed the default key resolver; hosts with other
/// identity fields override the resolver instead.
pub trait SessionContext {
    /// Identifier of the chat the request belongs to.
    fn chat_id(&self) -> Option<String>;

    /// Identifier of the request's sender.
    fn sender_id(&self) -> Option<String>;

    /// Sessions attached to this request.
    fn sessions(&self) -> &Sessions;

    /// Mutable access to the sessions attached to this request.
    fn sessions_mut(&mut self) -> &mut Sessions;
}
