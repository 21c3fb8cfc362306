//! Error types for timeline construction.

use thiserror::Error;

/// Result type for timeline operations.
pub type TimelineResult<T> = Result<T, TimelineError>;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Invalid segmenter config: {0}")]
    InvalidConfig(String),
}

impl TimelineError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
