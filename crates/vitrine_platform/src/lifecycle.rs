//! Application lifecycle signal
//!
//! Hosts report OS lifecycle transitions here; engines that care about
//! suspension (the background timer) subscribe. The richer host states are
//! collapsed into a two-state [`AppPhase`] before they reach subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

/// Buffered phase changes per subscriber before it lags
const SIGNAL_CAPACITY: usize = 16;

/// Host application state as reported by the OS
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AppState {
    /// In the foreground and receiving events
    Active,
    /// Transitioning, or partially obscured (e.g. app switcher, incoming call)
    Inactive,
    /// Not visible; the OS may freeze timers at any moment
    Background,
}

/// Two-state lifecycle phase delivered to subscribers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AppPhase {
    Foreground,
    Background,
}

impl From<AppState> for AppPhase {
    fn from(state: AppState) -> Self {
        match state {
            AppState::Active => AppPhase::Foreground,
            AppState::Inactive | AppState::Background => AppPhase::Background,
        }
    }
}

/// Application lifecycle events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Application resumed (came to foreground)
    Resumed,
    /// Application suspended (went to background)
    Suspended,
    /// System is low on memory - release caches if possible
    LowMemory,
}

impl LifecycleEvent {
    /// The phase this event moves the application into, if any
    pub fn phase(&self) -> Option<AppPhase> {
        match self {
            LifecycleEvent::Resumed => Some(AppPhase::Foreground),
            LifecycleEvent::Suspended => Some(AppPhase::Background),
            LifecycleEvent::LowMemory => None,
        }
    }
}

/// How the host OS treats scheduled timers while the app is backgrounded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuspensionBehavior {
    /// Timers stop firing in the background (Android)
    FreezesTimers,
    /// Timers keep firing in the background (iOS, desktop)
    KeepsRunning,
}

impl SuspensionBehavior {
    /// The behavior of the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        if cfg!(target_os = "android") {
            SuspensionBehavior::FreezesTimers
        } else {
            SuspensionBehavior::KeepsRunning
        }
    }

    /// Whether timers must persist and reconcile across suspension
    pub fn needs_reconciliation(self) -> bool {
        matches!(self, SuspensionBehavior::FreezesTimers)
    }
}

impl Default for SuspensionBehavior {
    fn default() -> Self {
        Self::for_current_platform()
    }
}

/// Broadcast source of [`AppPhase`] transitions
///
/// Cloning the signal yields another sender for the same subscribers.
#[derive(Clone, Debug)]
pub struct LifecycleSignal {
    sender: broadcast::Sender<AppPhase>,
}

impl LifecycleSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { sender }
    }

    /// Report a phase change to every current subscriber
    pub fn emit(&self, phase: AppPhase) {
        if self.sender.send(phase).is_err() {
            tracing::trace!("LifecycleSignal: {:?} emitted with no subscribers", phase);
        }
    }

    /// Report a host state, collapsed to its phase
    pub fn emit_state(&self, state: AppState) {
        self.emit(state.into());
    }

    /// Report a platform lifecycle event; events without a phase are ignored
    pub fn emit_event(&self, event: &LifecycleEvent) {
        if let Some(phase) = event.phase() {
            self.emit(phase);
        }
    }

    /// Subscribe to phase changes emitted after this call
    pub fn subscribe(&self) -> LifecycleSubscription {
        LifecycleSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LifecycleSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of a [`LifecycleSignal`]
#[derive(Debug)]
pub struct LifecycleSubscription {
    receiver: broadcast::Receiver<AppPhase>,
}

impl LifecycleSubscription {
    /// Wait for the next phase change
    ///
    /// Returns `None` once every signal sender has been dropped.
    pub async fn next(&mut self) -> Option<AppPhase> {
        loop {
            match self.receiver.recv().await {
                Ok(phase) => return Some(phase),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("LifecycleSubscription lagged, {} phase changes lost", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_collapses_to_phase() {
        assert_eq!(AppPhase::from(AppState::Active), AppPhase::Foreground);
        assert_eq!(AppPhase::from(AppState::Inactive), AppPhase::Background);
        assert_eq!(AppPhase::from(AppState::Background), AppPhase::Background);
    }

    #[test]
    fn test_low_memory_has_no_phase() {
        assert_eq!(LifecycleEvent::Resumed.phase(), Some(AppPhase::Foreground));
        assert_eq!(LifecycleEvent::Suspended.phase(), Some(AppPhase::Background));
        assert_eq!(LifecycleEvent::LowMemory.phase(), None);
    }

    #[test]
    fn test_suspension_behavior_serde_names() {
        let frozen: SuspensionBehavior = serde_json::from_str("\"freezes-timers\"").unwrap();
        assert_eq!(frozen, SuspensionBehavior::FreezesTimers);
        assert!(frozen.needs_reconciliation());

        let running: SuspensionBehavior = serde_json::from_str("\"keeps-running\"").unwrap();
        assert_eq!(running, SuspensionBehavior::KeepsRunning);
        assert!(!running.needs_reconciliation());
    }

    #[tokio::test]
    async fn test_subscribers_receive_emitted_phases() {
        let signal = LifecycleSignal::new();
        let mut first = signal.subscribe();
        let mut second = signal.subscribe();
        assert_eq!(signal.subscriber_count(), 2);

        signal.emit_state(AppState::Inactive);
        signal.emit_event(&LifecycleEvent::LowMemory);
        signal.emit_event(&LifecycleEvent::Resumed);

        assert_eq!(first.next().await, Some(AppPhase::Background));
        assert_eq!(first.next().await, Some(AppPhase::Foreground));
        assert_eq!(second.next().await, Some(AppPhase::Background));
        assert_eq!(second.next().await, Some(AppPhase::Foreground));
    }

    #[tokio::test]
    async fn test_subscription_ends_when_signal_dropped() {
        let signal = LifecycleSignal::new();
        let mut phases = signal.subscribe();
        drop(signal);
        assert_eq!(phases.next().await, None);
    }

    #[test]
    fn test_emit_without_subscribers_is_harmless() {
        let signal = LifecycleSignal::default();
        signal.emit(AppPhase::Background);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
