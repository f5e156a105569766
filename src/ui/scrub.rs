//! Elapsed-time scrub bar helpers.

/// Default length of a journaling session shown by the scrub bar.
pub const DEFAULT_TARGET_SECS: f64 = 5.0 * 60.0;

/// Fraction of the target duration already recorded, capped at 1.
///
/// A non-positive target yields 0.
pub fn scrub_progress(current_secs: f64, target_secs: f64) -> f64 {
    if target_secs <= 0.0 {
        return 0.0;
    }
    (current_secs / target_secs).clamp(0.0, 1.0)
}

/// Formats seconds as `m:ss`, truncating fractional seconds.
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.99), "0:09");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(300.0), "5:00");
        assert_eq!(format_time(3725.0), "62:05");
        assert_eq!(format_time(-3.0), "0:00");
    }

    #[test]
    fn test_scrub_progress() {
        assert_eq!(scrub_progress(0.0, DEFAULT_TARGET_SECS), 0.0);
        assert_eq!(scrub_progress(150.0, DEFAULT_TARGET_SECS), 0.5);
        assert_eq!(scrub_progress(900.0, DEFAULT_TARGET_SECS), 1.0);
    }

    #[test]
    fn test_scrub_progress_without_target() {
        assert_eq!(scrub_progress(10.0, 0.0), 0.0);
        assert_eq!(scrub_progress(10.0, -5.0), 0.0);
    }
}
