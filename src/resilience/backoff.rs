//! Exponential backoff with jitter.

use std::time::Duration;
use chrono::{DateTime, Utc};
use rand::Rng;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Whether enough time has passed since the last attempt to try again.
///
/// Jitter spreads out transactions that failed together during an outage.
pub fn retry_due(
    attempts: u32,
    last_attempt_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    base: Duration,
    max: Duration,
) -> bool {
    let Some(last) = last_attempt_at else {
        return true;
    };

    match chrono::Duration::from_std(calculate_backoff(attempts, base, max)) {
        Ok(delay) => now - last >= delay,
        Err(_) => false,
    }
}
