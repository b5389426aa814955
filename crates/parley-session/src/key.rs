//! Session key resolution.

use std::sync::Arc;

use crate::context::SessionContext;

/// Derives the session key for a request, or `None` to skip the session.
pub type KeyResolver<Ctx> = Arc<dyn Fn(&Ctx) -> Option<String> + Send + Sync>;

/// Default key policy: `<chat>:<sender>`.
///
/// Returns `None` when the context lacks either identifier, e.g. for updates
/// that do not come from a user in a chat.
pub fn default_session_key<Ctx: SessionContext + ?Sized>(ctx: &Ctx) -> Option<String> {
    let chat = ctx.chat_id()?;
    let sender = ctx.sender_id()?;
    Some(format!("{chat}:{sender}"))
}
