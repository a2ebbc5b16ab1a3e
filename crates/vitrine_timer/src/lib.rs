//! Vitrine Background Timer
//!
//! A counter that advances by a fixed delta at a nominal interval, keeps to
//! wall time by correcting scheduler drift, and survives the host app being
//! frozen in the background by persisting its state and catching up on
//! resume.
//!
//! # Features
//!
//! - **Drift correction**: Each tick folds its lateness into the next delay
//! - **End value**: Runs stop exactly at the end value, never overshooting it
//! - **Persistence**: `(value, time)` saved under `@value-{id}` / `@time-{id}`
//!   and reconciled by the next start
//! - **Suspension**: Where the OS freezes timers, background/foreground
//!   transitions save and reconcile the counter
//!
//! # Example
//!
//! ```ignore
//! use vitrine_timer::prelude::*;
//!
//! let timer = BackgroundTimer::builder("workout")
//!     .persistent(true)
//!     .lifecycle(&signal)
//!     .on_tick(|remaining| println!("{remaining}s left"))
//!     .on_stop(|| println!("done"))
//!     .build()?;
//!
//! timer.start(TimerOptions::countdown(90))?;
//! ```

pub mod config;
pub mod drift;
pub mod error;
pub mod persistence;
pub mod reconcile;
pub mod timer;


pub use config::TimerConfig;
pub use drift::DriftCorrector;
pub use error::{Result, TimerError};
pub use persistence::{PersistedSnapshot, TimerPersistence};
pub use reconcile::{crossed_end, reconcile};
pub use timer::{BackgroundTimer, BackgroundTimerBuilder, EventCallback, TimerOptions, ValueCallback};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::TimerConfig;
    pub use crate::error::{Result, TimerError};
    pub use crate::timer::{BackgroundTimer, TimerOptions};
}
