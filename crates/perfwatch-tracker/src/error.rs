//! Error types for the issue tracker client.

use std::time::Duration;

/// Issue tracker errors.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Token missing, invalid, or lacking permission.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Repository or issue does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The resource being created already exists (HTTP 422 `already_exists`).
    #[error("already exists: {resource}")]
    AlreadyExists { resource: String },

    /// Rate limit exceeded.
    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Transport failure or server error.
    #[error("network error: {message}")]
    Network { message: String },

    /// Unexpected status or unparseable body.
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl TrackerError {
    /// Whether the error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network { .. })
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TrackerError::RateLimited { retry_after: None }.is_retryable());
        assert!(TrackerError::Network {
            message: "HTTP 502".into()
        }
        .is_retryable());
        assert!(!TrackerError::Unauthorized {
            message: "bad token".into()
        }
        .is_retryable());
        assert!(!TrackerError::AlreadyExists {
            resource: "label".into()
        }
        .is_retryable());
    }
}
