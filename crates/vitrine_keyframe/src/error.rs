//! Error types for vitrine_keyframe

use thiserror::Error;

/// Errors that can occur while building a scroll timeline
#[derive(Error, Debug)]
pub enum TimelineError {
    /// Handshakes need a tokio runtime to join on
    #[error("No tokio runtime available; create the timeline inside a runtime or pass a handle")]
    NoRuntime,

    /// Timeline length is negative or not a finite number
    #[error("Invalid timeline length: {0}")]
    InvalidLength(f64),
}

/// Result type for vitrine_keyframe operations
pub type Result<T> = std::result::Result<T, TimelineError>;
