//! Wall-clock helpers for wire timestamps.
//!
//! Wire messages carry epoch milliseconds; liveness bookkeeping elsewhere
//! uses `tokio::time::Instant` so tests can pause the clock. Only the wire
//! side lives here.

use chrono::Utc;

/// Current wall-clock time as epoch milliseconds.
#[must_use]
pub fn tick_ms() -> i64 {
    Utc::now().timestamp_millis()
}
