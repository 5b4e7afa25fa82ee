//! Common time helpers for xwaves_core.

use std::time::Duration;

/// Longest wait the engine will ever request: one day.
pub const MAX_WAIT_SECS: f64 = 86_400.0;

/// Convert seconds to a `Duration`.
/// - Non-finite and negative inputs map to zero.
/// - Values above [`MAX_WAIT_SECS`] are clamped.
#[inline]
pub fn secs_to_duration(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(secs.min(MAX_WAIT_SECS))
}

/// Seconds between two instants, 0.0 if `later` precedes `earlier`.
#[inline]
pub fn secs_between(earlier: std::time::Instant, later: std::time::Instant) -> f64 {
    later.saturating_duration_since(earlier).as_secs_f64()
}
