//! Catch-up arithmetic for time the timer could not observe

/// Extrapolate `value` over `elapsed_ms` of missed ticks
///
/// Fractional intervals count, and the result is rounded half-up. Negative
/// elapsed time (a clock moved backwards) counts as none.
pub fn reconcile(value: i64, change: i64, interval_ms: u64, elapsed_ms: i64) -> i64 {
    let intervals = elapsed_ms.max(0) as f64 / interval_ms.max(1) as f64;
    (value as f64 + change as f64 * intervals + 0.5).floor() as i64
}

/// The end value, if `value` has reached or passed it
///
/// The comparison follows the sign of `change`: a countdown ends at or below
/// `end`, anything else at or above it.
pub fn crossed_end(value: i64, change: i64, end: Option<i64>) -> Option<i64> {
    let end = end?;
    let crossed = if change < 0 { value <= end } else { value >= end };
    crossed.then_some(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_missed_intervals() {
        assert_eq!(reconcile(0, 1, 1000, 5000), 5);
        assert_eq!(reconcile(60, -1, 1000, 12_000), 48);
        assert_eq!(reconcile(0, 1, 1000, 2499), 2);
        assert_eq!(reconcile(0, 1, 1000, 2500), 3);
        assert_eq!(reconcile(0, -1, 1000, 2500), -2);
    }

    #[test]
    fn test_backwards_clock_counts_nothing() {
        assert_eq!(reconcile(7, 1, 1000, -30_000), 7);
    }

    #[test]
    fn test_end_direction_follows_change_sign() {
        assert_eq!(crossed_end(0, -1, Some(0)), Some(0));
        assert_eq!(crossed_end(-3, -1, Some(0)), Some(0));
        assert_eq!(crossed_end(1, -1, Some(0)), None);
        assert_eq!(crossed_end(10, 1, Some(10)), Some(10));
        assert_eq!(crossed_end(9, 1, Some(10)), None);
        assert_eq!(crossed_end(i64::MIN, -1, None), None);
    }
}
