//! Wall clock sources
//!
//! Timestamps are Unix-epoch milliseconds so they can be persisted and
//! compared across process restarts.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

/// The real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_millis() as i64,
            // Clock set before 1970
            Err(err) => -(err.duration().as_millis() as i64),
        }
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Wall time that follows the tokio clock
///
/// Under `tokio::time::pause()` this clock advances exactly as far as the
/// runtime's timers do. [`TokioClock::jump`] moves wall time forward without
/// touching the runtime, which is what a frozen, backgrounded process
/// observes when it is thawed.
#[derive(Debug)]
pub struct TokioClock {
    origin_ms: i64,
    origin: tokio::time::Instant,
    jumped_ms: AtomicI64,
}

impl TokioClock {
    /// Anchor the clock at the current system time
    pub fn new() -> Self {
        Self::starting_at(SystemClock.now_ms())
    }

    /// Anchor the clock at an explicit wall time
    pub fn starting_at(origin_ms: i64) -> Self {
        Self {
            origin_ms,
            origin: tokio::time::Instant::now(),
            jumped_ms: AtomicI64::new(0),
        }
    }

    /// Move wall time forward without advancing tokio timers
    pub fn jump(&self, delta_ms: i64) {
        self.jumped_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        let elapsed = tokio::time::Instant::now().duration_since(self.origin);
        self.origin_ms + elapsed.as_millis() as i64 + self.jumped_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 1_250);
        clock.set(0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::starting_at(10_000);
        assert_eq!(clock.now_ms(), 10_000);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.now_ms(), 11_500);

        clock.jump(5_000);
        assert_eq!(clock.now_ms(), 16_500);
    }
}
