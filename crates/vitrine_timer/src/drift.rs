//! Tick scheduling with drift correction
//!
//! Every tick measures how late it fired relative to the previous one and
//! folds the difference into the next delay, so that over many ticks the
//! count tracks wall time instead of accumulating scheduler latency.

use std::time::Duration;

/// Running scheduling delay for one timer run
#[derive(Clone, Debug)]
pub struct DriftCorrector {
    fixed_ms: i64,
    delay_ms: i64,
    cycle: u64,
    last_tick_ms: Option<i64>,
}

impl DriftCorrector {
    pub fn new(interval_ms: u64) -> Self {
        let fixed_ms = i64::try_from(interval_ms).unwrap_or(i64::MAX);
        Self {
            fixed_ms,
            delay_ms: fixed_ms,
            cycle: 0,
            last_tick_ms: None,
        }
    }

    /// Record a tick observed at `now_ms` and adjust the next delay
    ///
    /// Returns the correction applied. The first measured correction (the
    /// second tick) is doubled, compensating for the dispatch latency of the
    /// very first scheduled callback.
    pub fn record_tick(&mut self, now_ms: i64) -> i64 {
        let mut diff = 0;
        if let Some(last) = self.last_tick_ms {
            diff = self.fixed_ms - (now_ms - last);
            if self.cycle == 1 {
                diff *= 2;
            }
        }

        self.last_tick_ms = Some(now_ms);
        self.delay_ms = self.delay_ms.saturating_add(diff);
        self.cycle += 1;
        diff
    }

    /// Delay until the next tick; negative corrections clamp to zero
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.max(0) as u64)
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Drop the previous tick time; the next tick measures no drift
    pub fn forget_reference(&mut self) {
        self.last_tick_ms = None;
    }

    /// Restart from the nominal interval after a suspension
    pub fn resume(&mut self) {
        self.last_tick_ms = None;
        self.delay_ms = self.fixed_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_tick_shrinks_next_delay() {
        let mut drift = DriftCorrector::new(1000);
        assert_eq!(drift.record_tick(1000), 0);
        assert_eq!(drift.record_tick(2000), 0);
        assert_eq!(drift.record_tick(3050), -50);
        assert_eq!(drift.delay(), Duration::from_millis(950));
    }

    #[test]
    fn test_second_tick_correction_is_doubled() {
        let mut drift = DriftCorrector::new(1000);
        drift.record_tick(1000);
        assert_eq!(drift.record_tick(2100), -200);
        assert_eq!(drift.delay_ms(), 800);

        // Later corrections are applied once
        assert_eq!(drift.record_tick(2900), 200);
        assert_eq!(drift.delay_ms(), 1000);
        assert_eq!(drift.cycle(), 3);
    }

    #[test]
    fn test_negative_delay_clamps_to_zero() {
        let mut drift = DriftCorrector::new(100);
        drift.record_tick(0);
        drift.record_tick(400);
        assert!(drift.delay_ms() < 0);
        assert_eq!(drift.delay(), Duration::ZERO);
    }

    #[test]
    fn test_forgotten_reference_measures_nothing() {
        let mut drift = DriftCorrector::new(1000);
        drift.record_tick(1000);
        drift.record_tick(2000);
        drift.forget_reference();
        assert_eq!(drift.record_tick(60_000), 0);

        drift.record_tick(61_300);
        drift.resume();
        assert_eq!(drift.delay(), Duration::from_millis(1000));
    }
}
