//! Background timer
//!
//! A counter advanced by a fixed delta every interval. Each run owns at most
//! one pending tick task and, on platforms that freeze timers, one lifecycle
//! listener task. Both hold only a weak reference to the timer and exit as
//! soon as the run they were spawned for is over.
//!
//! Values are reported only through callbacks, and callbacks are always
//! invoked with the timer's lock released.

use crate::config::TimerConfig;
use crate::drift::DriftCorrector;
use crate::error::{Result, TimerError};
use crate::persistence::{PersistedSnapshot, TimerPersistence};
use crate::reconcile::{crossed_end, reconcile};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use vitrine_platform::{
    AppPhase, Clock, KeyValueStorage, LifecycleSignal, LifecycleSubscription, MemoryStorage,
    SuspensionBehavior, SystemClock,
};

/// Callback receiving the counter value
pub type ValueCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// Callback for run state changes
pub type EventCallback = Arc<dyn Fn() + Send + Sync>;

/// Parameters of one timer run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerOptions {
    pub initial_value: i64,
    /// Signed delta applied every tick; negative counts down
    pub change_value: i64,
    pub interval_ms: u64,
    /// Value at which the run stops; it is always reported exactly
    pub end_value: Option<i64>,
}

impl TimerOptions {
    pub fn new(initial_value: i64, change_value: i64, interval_ms: u64) -> Self {
        Self {
            initial_value,
            change_value,
            interval_ms,
            end_value: None,
        }
    }

    /// Count down by one per second from `seconds` to zero
    pub fn countdown(seconds: i64) -> Self {
        Self::new(seconds, -1, 1000).until(0)
    }

    pub fn until(mut self, end_value: i64) -> Self {
        self.end_value = Some(end_value);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(TimerError::InvalidInterval);
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
struct TimerCallbacks {
    on_tick: Option<ValueCallback>,
    on_start: Option<EventCallback>,
    on_stop: Option<EventCallback>,
    on_reset: Option<EventCallback>,
}

impl TimerCallbacks {
    fn tick(&self, value: i64) {
        if let Some(on_tick) = &self.on_tick {
            on_tick(value);
        }
    }

    fn start(&self) {
        if let Some(on_start) = &self.on_start {
            on_start();
        }
    }

    fn stop(&self) {
        if let Some(on_stop) = &self.on_stop {
            on_stop();
        }
    }

    fn reset(&self) {
        if let Some(on_reset) = &self.on_reset {
            on_reset();
        }
    }
}

/// Outcome of advancing the counter outside the lock
enum Step {
    Advanced(i64),
    Finished(i64),
    Idle,
}

#[derive(Default)]
struct TimerInner {
    value: Option<i64>,
    options: Option<TimerOptions>,
    drift: Option<DriftCorrector>,
    /// Snapshot loaded at construction, consumed by the first start
    persisted: Option<PersistedSnapshot>,
    suspended: bool,
    /// Bumped on every start/stop; lifecycle listeners carry it
    generation: u64,
    /// Bumped whenever the tick task is replaced or cancelled
    schedule: u64,
    tick_task: Option<AbortHandle>,
    lifecycle_task: Option<AbortHandle>,
}

impl TimerInner {
    fn cancel_ticks(&mut self) {
        self.schedule += 1;
        if let Some(task) = self.tick_task.take() {
            task.abort();
        }
    }

    fn cancel_tasks(&mut self) {
        self.cancel_ticks();
        if let Some(task) = self.lifecycle_task.take() {
            task.abort();
        }
    }

    /// Advance by `change` after `elapsed_ms` unobserved, honoring the end value
    fn catch_up(&mut self, elapsed_ms: i64) -> Step {
        let (Some(value), Some(options)) = (self.value, self.options) else {
            return Step::Idle;
        };
        let caught_up = reconcile(
            value,
            options.change_value,
            options.interval_ms,
            elapsed_ms,
        );
        match crossed_end(caught_up, options.change_value, options.end_value) {
            Some(end) => Step::Finished(end),
            None => {
                self.value = Some(caught_up);
                Step::Advanced(caught_up)
            }
        }
    }
}

struct TimerShared {
    id: String,
    persistence: TimerPersistence,
    clock: Arc<dyn Clock>,
    callbacks: TimerCallbacks,
    lifecycle: Option<LifecycleSignal>,
    suspension: SuspensionBehavior,
    runtime: Handle,
    inner: Mutex<TimerInner>,
    /// Orders suspend's storage writes against the clear in `halt`; taken
    /// before `inner`, never while holding it
    persist: Mutex<()>,
}

impl TimerShared {
    fn lock(&self) -> MutexGuard<'_, TimerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_persist(&self) -> MutexGuard<'_, ()> {
        self.persist.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(self: &Arc<Self>, options: TimerOptions) -> Result<()> {
        options.validate()?;

        let (step, generation) = {
            let mut inner = self.lock();
            if inner.value.is_some() {
                tracing::warn!(
                    "BackgroundTimer {}: start() while running, restarting",
                    self.id
                );
                inner.cancel_tasks();
            }

            inner.generation += 1;
            inner.value = Some(options.initial_value);
            inner.options = Some(options);
            inner.drift = Some(DriftCorrector::new(options.interval_ms));
            inner.suspended = false;

            let step = match inner.persisted.take() {
                Some(snapshot) => {
                    inner.value = Some(snapshot.value);
                    let elapsed = self.clock.now_ms() - snapshot.time_ms;
                    tracing::debug!(
                        "BackgroundTimer {}: reconciling {} over {}ms",
                        self.id,
                        snapshot.value,
                        elapsed
                    );
                    inner.catch_up(elapsed)
                }
                None => Step::Idle,
            };
            (step, inner.generation)
        };

        match step {
            Step::Finished(end) => {
                self.stop();
                self.callbacks.tick(end);
                return Ok(());
            }
            Step::Advanced(value) => self.callbacks.tick(value),
            Step::Idle => {}
        }

        {
            let mut inner = self.lock();
            // on_tick may have stopped or restarted the timer
            if inner.generation != generation || inner.value.is_none() {
                tracing::debug!(
                    "BackgroundTimer {}: run ended during start, not scheduling",
                    self.id
                );
                return Ok(());
            }
            self.watch_lifecycle(&mut inner);
            self.schedule(&mut inner);
        }

        tracing::debug!("BackgroundTimer {}: started {:?}", self.id, options);
        self.callbacks.start();
        Ok(())
    }

    /// End the run; returns whether one was in progress
    fn halt(&self) -> bool {
        let was_running = {
            let mut inner = self.lock();
            inner.cancel_tasks();
            inner.generation += 1;
            inner.suspended = false;
            inner.drift = None;
            inner.options = None;
            inner.value.take().is_some()
        };
        // Waits out a suspend that is mid-write
        let _persist = self.lock_persist();
        self.persistence.clear();
        was_running
    }

    fn stop(&self) {
        if self.halt() {
            tracing::debug!("BackgroundTimer {}: stopped", self.id);
            self.callbacks.stop();
        }
    }

    fn reset(self: &Arc<Self>, options: Option<TimerOptions>, call_stop_callback: bool) -> Result<()> {
        if let Some(options) = &options {
            options.validate()?;
        }

        self.halt();
        self.lock().persisted = None;
        tracing::debug!("BackgroundTimer {}: reset", self.id);

        if call_stop_callback {
            self.callbacks.stop();
        }
        self.callbacks.reset();

        match options {
            Some(options) => self.start(options),
            None => Ok(()),
        }
    }

    fn schedule(self: &Arc<Self>, inner: &mut TimerInner) {
        inner.cancel_ticks();
        let schedule = inner.schedule;
        let timer = Arc::downgrade(self);
        let task = self.runtime.spawn(run_ticks(timer, schedule));
        inner.tick_task = Some(task.abort_handle());
    }

    fn watch_lifecycle(self: &Arc<Self>, inner: &mut TimerInner) {
        if !self.suspension.needs_reconciliation() {
            return;
        }
        let Some(signal) = &self.lifecycle else {
            return;
        };

        let phases = signal.subscribe();
        let timer = Arc::downgrade(self);
        let task = self
            .runtime
            .spawn(run_lifecycle(timer, phases, inner.generation));
        inner.lifecycle_task = Some(task.abort_handle());
    }

    fn next_delay(&self, schedule: u64) -> Option<std::time::Duration> {
        let inner = self.lock();
        if inner.schedule != schedule {
            return None;
        }
        inner.drift.as_ref().map(DriftCorrector::delay)
    }

    /// Advance one tick; false once this schedule is over
    fn tick(&self, schedule: u64) -> bool {
        let now = self.clock.now_ms();
        let step = {
            let mut inner = self.lock();
            if inner.schedule != schedule || inner.suspended {
                return false;
            }
            let (Some(value), Some(options)) = (inner.value, inner.options) else {
                return false;
            };
            if let Some(drift) = inner.drift.as_mut() {
                drift.record_tick(now);
            }

            let next = value.saturating_add(options.change_value);
            match crossed_end(next, options.change_value, options.end_value) {
                Some(end) => Step::Finished(end),
                None => {
                    inner.value = Some(next);
                    Step::Advanced(next)
                }
            }
        };

        match step {
            Step::Advanced(value) => {
                tracing::trace!("BackgroundTimer {}: tick {}", self.id, value);
                self.callbacks.tick(value);
                true
            }
            Step::Finished(end) => {
                tracing::debug!("BackgroundTimer {}: reached {}", self.id, end);
                self.stop();
                self.callbacks.tick(end);
                false
            }
            Step::Idle => false,
        }
    }

    /// App went to the background: save state and freeze the tick
    fn suspend(&self, generation: u64) {
        let _persist = self.lock_persist();
        let now = self.clock.now_ms();
        let value = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            if let Some(drift) = inner.drift.as_mut() {
                drift.forget_reference();
            }
            if !inner.suspended {
                inner.suspended = true;
                inner.cancel_ticks();
                tracing::debug!("BackgroundTimer {}: suspended at {:?}", self.id, inner.value);
            }
            inner.value
        };

        self.persistence.save_time(now);
        if let Some(value) = value {
            self.persistence.save_value(value);
        }
    }

    /// App returned to the foreground: catch up on the frozen interval
    fn resume(self: &Arc<Self>, generation: u64) {
        let saved_ms = self.persistence.load_time();
        let step = {
            let mut inner = self.lock();
            if inner.generation != generation || !inner.suspended {
                return;
            }
            inner.suspended = false;

            let step = match saved_ms {
                Some(saved_ms) => inner.catch_up(self.clock.now_ms() - saved_ms),
                None => Step::Idle,
            };
            if !matches!(step, Step::Finished(_)) {
                if let Some(drift) = inner.drift.as_mut() {
                    drift.resume();
                }
                self.schedule(&mut inner);
            }
            step
        };

        match step {
            Step::Advanced(value) => {
                tracing::debug!("BackgroundTimer {}: resumed at {}", self.id, value);
                self.callbacks.tick(value);
            }
            Step::Finished(end) => {
                tracing::debug!("BackgroundTimer {}: reached {} while suspended", self.id, end);
                self.stop();
                self.callbacks.tick(end);
            }
            Step::Idle => {}
        }
    }
}

async fn run_ticks(timer: Weak<TimerShared>, schedule: u64) {
    loop {
        let Some(delay) = timer.upgrade().and_then(|timer| timer.next_delay(schedule)) else {
            return;
        };
        tokio::time::sleep(delay).await;

        match timer.upgrade() {
            Some(timer) if timer.tick(schedule) => {}
            _ => return,
        }
    }
}

async fn run_lifecycle(timer: Weak<TimerShared>, mut phases: LifecycleSubscription, generation: u64) {
    while let Some(phase) = phases.next().await {
        let Some(timer) = timer.upgrade() else {
            return;
        };
        match phase {
            AppPhase::Background => timer.suspend(generation),
            AppPhase::Foreground => timer.resume(generation),
        }
    }
}

/// Builder for [`BackgroundTimer`]
pub struct BackgroundTimerBuilder {
    id: String,
    persistent: bool,
    callbacks: TimerCallbacks,
    storage: Option<Arc<dyn KeyValueStorage>>,
    clock: Option<Arc<dyn Clock>>,
    lifecycle: Option<LifecycleSignal>,
    suspension: SuspensionBehavior,
}

impl BackgroundTimerBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            persistent: false,
            callbacks: TimerCallbacks::default(),
            storage: None,
            clock: None,
            lifecycle: None,
            suspension: SuspensionBehavior::for_current_platform(),
        }
    }

    /// Load a previously saved `(value, time)` for this id on build
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn on_tick<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.callbacks.on_tick = Some(Arc::new(callback));
        self
    }

    pub fn on_start<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_start = Some(Arc::new(callback));
        self
    }

    pub fn on_stop<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_stop = Some(Arc::new(callback));
        self
    }

    pub fn on_reset<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callbacks.on_reset = Some(Arc::new(callback));
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn lifecycle(mut self, signal: &LifecycleSignal) -> Self {
        self.lifecycle = Some(signal.clone());
        self
    }

    pub fn suspension(mut self, suspension: SuspensionBehavior) -> Self {
        self.suspension = suspension;
        self
    }

    pub fn config(self, config: &TimerConfig) -> Self {
        self.suspension(config.suspension)
    }

    /// Build the timer on the current tokio runtime
    pub fn build(self) -> Result<BackgroundTimer> {
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let persistence = TimerPersistence::new(&self.id, storage);

        let mut inner = TimerInner::default();
        if self.persistent {
            inner.persisted = persistence.load();
            if let Some(snapshot) = &inner.persisted {
                tracing::debug!("BackgroundTimer {}: loaded {:?}", self.id, snapshot);
            }
        }

        Ok(BackgroundTimer {
            shared: Arc::new(TimerShared {
                id: self.id,
                persistence,
                clock,
                callbacks: self.callbacks,
                lifecycle: self.lifecycle,
                suspension: self.suspension,
                runtime,
                inner: Mutex::new(inner),
                persist: Mutex::new(()),
            }),
        })
    }
}

/// Drift-corrected counter that survives app suspension
///
/// ```ignore
/// let timer = BackgroundTimer::builder("sleep")
///     .persistent(true)
///     .on_tick(|value| println!("{value}"))
///     .build()?;
/// timer.start(TimerOptions::countdown(60))?;
/// ```
pub struct BackgroundTimer {
    shared: Arc<TimerShared>,
}

impl BackgroundTimer {
    pub fn builder(id: impl Into<String>) -> BackgroundTimerBuilder {
        BackgroundTimerBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Begin a run
    ///
    /// A snapshot loaded at construction is reconciled first. Starting while
    /// already running replaces the current run.
    pub fn start(&self, options: TimerOptions) -> Result<()> {
        self.shared.start(options)
    }

    /// End the run and clear saved state; calling it again does nothing
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Clear all state, optionally starting a new run
    pub fn reset(&self, options: Option<TimerOptions>, call_stop_callback: bool) -> Result<()> {
        self.shared.reset(options, call_stop_callback)
    }

    pub fn current_value(&self) -> Option<i64> {
        self.shared.lock().value
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().value.is_some()
    }

    /// Whether the run is frozen while the app is backgrounded
    pub fn is_suspended(&self) -> bool {
        self.shared.lock().suspended
    }
}

impl Drop for BackgroundTimer {
    fn drop(&mut self) {
        self.shared.lock().cancel_tasks();
    }
}

impl std::fmt::Debug for BackgroundTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("BackgroundTimer")
            .field("id", &self.shared.id)
            .field("value", &inner.value)
            .field("options", &inner.options)
            .field("suspended", &inner.suspended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_runtime() {
        let result = BackgroundTimer::builder("t").build();
        assert!(matches!(result, Err(TimerError::NoRuntime)));
    }

    #[test]
    fn test_countdown_options() {
        let options = TimerOptions::countdown(30);
        assert_eq!(options.initial_value, 30);
        assert_eq!(options.change_value, -1);
        assert_eq!(options.interval_ms, 1000);
        assert_eq!(options.end_value, Some(0));
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let timer = BackgroundTimer::builder("t").build().unwrap();
        assert_eq!(
            timer.start(TimerOptions::new(0, 1, 0)),
            Err(TimerError::InvalidInterval)
        );
        assert!(!timer.is_running());
    }
}
