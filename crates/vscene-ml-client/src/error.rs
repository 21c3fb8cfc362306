//! ML client error types.

use reqwest::StatusCode;
use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = format!("ML service returned {}: {}", status, body);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            MlError::ServiceUnavailable(message)
        } else {
            MlError::RequestFailed(message)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, MlError::ServiceUnavailable(_) | MlError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(MlError::from_status(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(MlError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(!MlError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "bad path").is_retryable());
    }
}
