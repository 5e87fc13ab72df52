use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time in epoch milliseconds. Injected so freshness rules can be tested.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().timestamp_millis())
}

/// RFC 3339 rendering of a clock reading, as the backend formats `created_at`.
pub(crate) fn rfc3339(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
