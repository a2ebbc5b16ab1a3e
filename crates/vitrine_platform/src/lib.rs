//! Vitrine Platform Collaborators
//!
//! This crate provides the host-side pieces the Vitrine engines consume but
//! do not own: the application lifecycle signal, a synchronous key-value
//! store, and a wall clock.
//!
//! # Architecture
//!
//! The collaborators are built around three seams:
//!
//! - [`LifecycleSignal`] - Foreground/background transitions reported by the OS
//! - [`KeyValueStorage`] - String key-value persistence (`get_string`/`set`/`delete`)
//! - [`Clock`] - Unix-epoch wall time in milliseconds
//!
//! # Example
//!
//! ```ignore
//! use vitrine_platform::prelude::*;
//!
//! let signal = LifecycleSignal::new();
//! let mut phases = signal.subscribe();
//!
//! signal.emit_state(AppState::Background);
//! assert_eq!(phases.next().await, Some(AppPhase::Background));
//! ```

mod clock;
mod error;
mod lifecycle;
mod storage;

// Re-export all public types
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use error::{PlatformError, Result};
pub use lifecycle::{
    AppPhase, AppState, LifecycleEvent, LifecycleSignal, LifecycleSubscription,
    SuspensionBehavior,
};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock, TokioClock};
    pub use crate::error::{PlatformError, Result};
    pub use crate::lifecycle::{
        AppPhase, AppState, LifecycleEvent, LifecycleSignal, LifecycleSubscription,
        SuspensionBehavior,
    };
    pub use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage};
}
