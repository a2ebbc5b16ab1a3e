//! Countdown with optional simulated suspension
//!
//! Runs a [`BackgroundTimer`] to zero. When asked to, the app is "sent to the
//! background" partway through: the lifecycle signal reports the background
//! phase, real time passes, and the foreground phase is reported again.

use crate::config::TimerSection;
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::info;
use vitrine_platform::{
    AppPhase, Clock, FileStorage, KeyValueStorage, LifecycleSignal, MemoryStorage,
    SuspensionBehavior,
};
use vitrine_timer::{BackgroundTimer, TimerOptions};

/// Parameters of one countdown run
#[derive(Clone, Debug)]
pub struct CountdownPlan {
    pub id: String,
    pub seconds: i64,
    pub interval: Duration,
    /// Resume a previously saved run for `id`
    pub persist: bool,
    /// Go to the background this long after starting
    pub suspend_after: Option<Duration>,
    pub suspend_for: Duration,
    /// Force timers to freeze while suspended, whatever the platform
    pub freeze: bool,
}

impl Default for CountdownPlan {
    fn default() -> Self {
        Self {
            id: "countdown".to_string(),
            seconds: 10,
            interval: Duration::from_secs(1),
            persist: false,
            suspend_after: None,
            suspend_for: Duration::from_secs(5),
            freeze: false,
        }
    }
}

/// Open the configured storage, in memory when no path is set
pub fn open_storage(section: &TimerSection) -> Result<Arc<dyn KeyValueStorage>> {
    match &section.storage {
        Some(path) => {
            let storage = FileStorage::open(path)
                .with_context(|| format!("Failed to open timer storage {}", path.display()))?;
            info!("Persisting timer state to {}", path.display());
            Ok(Arc::new(storage))
        }
        None => Ok(Arc::new(MemoryStorage::new())),
    }
}

/// Run the countdown to its end; returns every reported value
pub async fn run_countdown(
    section: &TimerSection,
    plan: &CountdownPlan,
    storage: Arc<dyn KeyValueStorage>,
    clock: Arc<dyn Clock>,
) -> Result<Vec<i64>> {
    let interval_ms = u64::try_from(plan.interval.as_millis()).context("Interval too long")?;
    let signal = LifecycleSignal::new();
    let finished = Arc::new(Notify::new());
    let reported = Arc::new(Mutex::new(Vec::new()));

    let mut config = section.timer_config();
    if plan.freeze {
        config.suspension = SuspensionBehavior::FreezesTimers;
    }

    let timer = {
        let finished = finished.clone();
        let reported = reported.clone();
        BackgroundTimer::builder(plan.id.as_str())
            .persistent(plan.persist)
            .storage(storage)
            .clock(clock)
            .lifecycle(&signal)
            .config(&config)
            .on_start(|| info!("Countdown started"))
            .on_tick(move |value| {
                info!("{}", value);
                reported
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .push(value);
            })
            .on_stop(move || finished.notify_one())
            .build()?
    };

    timer.start(TimerOptions::new(plan.seconds, -1, interval_ms).until(0))?;

    if let Some(after) = plan.suspend_after {
        tokio::select! {
            _ = finished.notified() => return Ok(take(&reported)),
            _ = tokio::time::sleep(after) => {}
        }

        info!("App backgrounded for {:?} ({:?})", plan.suspend_for, config.suspension);
        signal.emit(AppPhase::Background);
        tokio::time::sleep(plan.suspend_for).await;
        info!("App foregrounded");
        signal.emit(AppPhase::Foreground);
    }

    finished.notified().await;
    info!("Countdown finished");
    Ok(take(&reported))
}

fn take(reported: &Mutex<Vec<i64>>) -> Vec<i64> {
    std::mem::take(&mut *reported.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_platform::TokioClock;

    fn fast(seconds: i64) -> CountdownPlan {
        CountdownPlan {
            seconds,
            interval: Duration::from_millis(100),
            ..CountdownPlan::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_to_zero() {
        let values = run_countdown(
            &TimerSection::default(),
            &fast(5),
            Arc::new(MemoryStorage::new()),
            Arc::new(TokioClock::new()),
        )
        .await
        .unwrap();

        assert_eq!(values, vec![4, 3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frozen_suspension_is_reconciled() {
        let clock = Arc::new(TokioClock::new());
        let plan = CountdownPlan {
            suspend_after: Some(Duration::from_millis(250)),
            suspend_for: Duration::from_millis(400),
            freeze: true,
            ..fast(10)
        };

        let values = run_countdown(
            &TimerSection::default(),
            &plan,
            Arc::new(MemoryStorage::new()),
            clock,
        )
        .await
        .unwrap();

        // Two ticks, then four intervals caught up at once on resume
        assert_eq!(&values[..3], &[9, 8, 4]);
        assert_eq!(values.last(), Some(&0));
        assert!(values.windows(2).all(|pair| pair[1] < pair[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_storage_is_cleared_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let section = TimerSection {
            storage: Some(dir.path().join("timers.json")),
            ..TimerSection::default()
        };
        let storage = open_storage(&section).unwrap();
        let plan = CountdownPlan {
            suspend_after: Some(Duration::from_millis(150)),
            suspend_for: Duration::from_millis(100),
            freeze: true,
            ..fast(3)
        };

        run_countdown(&section, &plan, storage.clone(), Arc::new(TokioClock::new()))
            .await
            .unwrap();

        assert_eq!(storage.get_string("@value-countdown"), None);
        assert_eq!(storage.get_string("@time-countdown"), None);
    }
}
