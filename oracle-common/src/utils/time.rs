use std::time::Duration;

use chrono::{DateTime, Utc};

/// Unix epoch milliseconds. All report and round timestamps use this unit.
pub type Millis = i64;

/// Current wall-clock time in milliseconds since 1970-01-01 UTC.
pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

/// Wall-clock distance from `now` until `at`, zero if `at` already passed.
pub fn until(at: Millis, now: Millis) -> Duration {
    Duration::from_millis(u64::try_from(at.saturating_sub(now)).unwrap_or(0))
}

/// `HH:MM:SS.mmm` rendering for log lines.
pub fn format_millis(ts: Millis) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| ts.to_string())
}
