//! Expiry policy. No filesystem access.

use chrono::Utc;

/// Current time in unix seconds.
pub(crate) fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Parse the contents of a stamp file.
pub(crate) fn parse_stamp(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// An entry is expired once its age exceeds `ttl_secs`.
///
/// Age is measured in both directions, so a stamp from the future (clock
/// moved backwards since the write) also expires after `ttl_secs`.
pub(crate) fn is_expired(created_at: i64, now: i64, ttl_secs: u64) -> bool {
    now.abs_diff(created_at) > ttl_secs
}
