//! Expiry timestamps for saved sessions.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Compute the expiry timestamp `now + ttl`.
///
/// Saturates at the largest representable timestamp instead of overflowing.
pub fn expiry_from(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Check whether an expiry timestamp has passed at `now`.
pub fn is_expired(expire_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expire_at <= now
}
