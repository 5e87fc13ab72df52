use serde::{Deserialize, Serialize};

/// Maximum age of cached history lists and report bodies.
pub const RESULT_TTL_MS: i64 = 30 * 60 * 1000;

/// Maximum age of a cached user profile before it must be re-resolved.
pub const PROFILE_TTL_MS: i64 = 60 * 60 * 1000;

/// A payload stamped with the time it was cached, in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    #[serde(rename = "data")]
    pub payload: T,
    #[serde(rename = "timestamp")]
    pub cached_at_epoch_ms: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(payload: T, now_epoch_ms: i64) -> Self {
        Self {
            payload,
            cached_at_epoch_ms: now_epoch_ms,
        }
    }

    /// An entry is fresh while `now - cached_at <= ttl`.
    pub fn is_fresh(&self, now_epoch_ms: i64, ttl_ms: i64) -> bool {
        now_epoch_ms.saturating_sub(self.cached_at_epoch_ms) <= ttl_ms
    }

    /// Returns the payload if fresh, `None` otherwise.
    pub fn into_fresh(self, now_epoch_ms: i64, ttl_ms: i64) -> Option<T> {
        if self.is_fresh(now_epoch_ms, ttl_ms) {
            Some(self.payload)
        } else {
            None
        }
    }
}
