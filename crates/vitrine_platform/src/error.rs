//! Platform error types

use thiserror::Error;

/// Platform-related errors
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Backing file does not hold a JSON object of strings
    #[error("Storage file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
