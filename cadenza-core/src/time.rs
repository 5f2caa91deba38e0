//! Time and duration conversion utilities.
//!
//! Conversions here saturate instead of truncating, so a pathological
//! duration never wraps around.

use std::time::Duration;

/// Extension trait for safe Duration conversions.
pub trait DurationExt {
    /// Convert duration to milliseconds as u64, saturating at `u64::MAX`.
    fn as_millis_u64(&self) -> u64;

    /// Format as a `m:ss.mmm` clock string for display and logging.
    fn to_clock(&self) -> String;
}

impl DurationExt for Duration {
    fn as_millis_u64(&self) -> u64 {
        u64::try_from(self.as_millis()).unwrap_or(u64::MAX)
    }

    fn to_clock(&self) -> String {
        let millis = self.as_millis_u64();
        let minutes = millis / 60_000;
        let seconds = (millis / 1000) % 60;
        let rest = millis % 1000;
        format!("{minutes}:{seconds:02}.{rest:03}")
    }
}

/// Build a duration from whole seconds given as a float, rejecting negative,
/// NaN and infinite values.
#[must_use]
pub fn duration_from_secs_f64(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_millis_u64() {
        let duration = Duration::from_millis(1234);
        assert_eq!(duration.as_millis_u64(), 1234);
    }

    #[test]
    fn test_as_millis_u64_zero() {
        assert_eq!(Duration::ZERO.as_millis_u64(), 0);
    }

    #[test]
    fn test_to_clock() {
        assert_eq!(Duration::ZERO.to_clock(), "0:00.000");
        assert_eq!(Duration::from_millis(3_723_004).to_clock(), "62:03.004");
        assert_eq!(Duration::from_millis(61_500).to_clock(), "1:01.500");
    }

    #[test]
    fn test_duration_from_secs_f64() {
        assert_eq!(duration_from_secs_f64(1.5), Some(Duration::from_millis(1500)));
        assert_eq!(duration_from_secs_f64(0.0), Some(Duration::ZERO));
        assert_eq!(duration_from_secs_f64(-1.0), None);
        assert_eq!(duration_from_secs_f64(f64::NAN), None);
        assert_eq!(duration_from_secs_f64(f64::INFINITY), None);
    }
}
