//! Display helpers for positions and progress

use std::time::Duration;

/// Format as `M:SS`
///
/// Seconds are floored and zero-padded, minutes are not padded and keep
/// growing past 59 (`75:03`).
pub fn format_time(time: Duration) -> String {
    let total = time.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Format fractional seconds as `M:SS`; negative and non-finite values read as zero
pub fn format_seconds(seconds: f64) -> String {
    format_time(seconds_to_duration(seconds))
}

/// `position / duration * 100`, or 0 while the duration is unknown
pub fn progress_percent(position: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 0.0;
    }
    (position.as_secs_f64() / duration.as_secs_f64() * 100.0).clamp(0.0, 100.0)
}

/// Convert caller-supplied seconds, treating negative and non-finite input as zero
pub fn seconds_to_duration(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
