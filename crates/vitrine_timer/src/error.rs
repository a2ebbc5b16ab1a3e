//! Error types for vitrine_timer

use thiserror::Error;

/// Errors that can occur while building or starting a timer
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimerError {
    /// Ticks are scheduled on a tokio runtime
    #[error("No tokio runtime available; build the timer inside a runtime")]
    NoRuntime,

    /// A zero interval would tick in a busy loop
    #[error("Timer interval must be at least 1ms")]
    InvalidInterval,
}

/// Result type for vitrine_timer operations
pub type Result<T> = std::result::Result<T, TimerError>;
