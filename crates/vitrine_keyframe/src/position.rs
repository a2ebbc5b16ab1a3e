//! Keyframe scroll bounds and normalized progress

use serde::{Deserialize, Serialize};

/// Scroll-offset range in which a keyframe region is active
///
/// Bounds are inclusive and share the unit of the scroll surface's offset.
/// A range with `end <= start` is degenerate: it is never partially
/// progressed, and its progress reads `0.0`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ScrollPosition {
    pub start: f64,
    pub end: f64,
}

impl ScrollPosition {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether `offset` falls inside `[start, end]`
    pub fn contains(&self, offset: f64) -> bool {
        offset >= self.start && offset <= self.end
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_degenerate(&self) -> bool {
        let span = self.span();
        span.is_nan() || span <= 0.0
    }

    /// Normalized position of `offset` within the range, clamped to `[0, 1]`
    pub fn progress(&self, offset: f64) -> f64 {
        if self.is_degenerate() || !offset.is_finite() {
            return 0.0;
        }
        ((offset - self.start) / self.span()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive() {
        let pos = ScrollPosition::new(100.0, 500.0);
        assert!(pos.contains(100.0));
        assert!(pos.contains(500.0));
        assert!(!pos.contains(99.9));
        assert!(!pos.contains(500.1));
    }

    #[test]
    fn test_progress_is_monotonic_inside_range() {
        let pos = ScrollPosition::new(100.0, 500.0);
        let mut last = pos.progress(100.0);
        assert_eq!(last, 0.0);

        let mut offset = 100.0;
        while offset <= 500.0 {
            let p = pos.progress(offset);
            assert!(p >= last, "progress went backwards at {}", offset);
            last = p;
            offset += 7.5;
        }
        assert_eq!(pos.progress(500.0), 1.0);
        assert_eq!(pos.progress(300.0), 0.5);
    }

    #[test]
    fn test_progress_clamps_outside_range() {
        let pos = ScrollPosition::new(100.0, 500.0);
        assert_eq!(pos.progress(-1_000.0), 0.0);
        assert_eq!(pos.progress(10_000.0), 1.0);
    }

    #[test]
    fn test_degenerate_range_has_zero_progress() {
        let inverted = ScrollPosition::new(500.0, 100.0);
        assert!(inverted.is_degenerate());
        assert_eq!(inverted.progress(300.0), 0.0);

        let empty = ScrollPosition::new(200.0, 200.0);
        assert!(empty.is_degenerate());
        assert!(empty.contains(200.0));
        assert_eq!(empty.progress(200.0), 0.0);

        let nan = ScrollPosition::new(f64::NAN, 100.0);
        assert!(nan.is_degenerate());
        assert_eq!(nan.progress(50.0), 0.0);
    }

    #[test]
    fn test_non_finite_offset_has_zero_progress() {
        let pos = ScrollPosition::new(0.0, 100.0);
        assert_eq!(pos.progress(f64::NAN), 0.0);
        assert_eq!(pos.progress(f64::INFINITY), 0.0);
    }
}
