use std::time::Duration;

use chrono::{DateTime, Utc};

/// Linear retry delay: `attempt * base`, where `attempt` is the 1-based
/// attempt that just failed
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt.max(1))
}

/// `now + delay`, saturating at the largest representable time
pub(crate) fn after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
