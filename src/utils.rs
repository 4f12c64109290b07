//! Utility functions for log formatting and timing.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging long error messages
//! - Randomized jitter delays between page visits
//! - Exponential backoff delays between retry attempts

use rand::{Rng, rng};
use std::time::Duration;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Pick a random delay in `[min_ms, max_ms]`.
///
/// Used before each navigation so that requests don't arrive at a fixed
/// cadence. A reversed range is treated as `max_ms..=min_ms`.
pub fn jitter_delay(min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = if min_ms <= max_ms { (min_ms, max_ms) } else { (max_ms, min_ms) };
    Duration::from_millis(rng().random_range(lo..=hi))
}

/// Delay before the retry that follows failed attempt number `attempt`.
///
/// `attempt` is zero-based, so the first retry waits `base`, the second
/// `2 * base`, then `4 * base` and so on.
///
/// ```text
/// delay = base * 2^attempt
/// ```
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
}
