//! Error types for notification channels

use thiserror::Error;

/// Result type alias for notification operations
pub type Result<T> = std::result::Result<T, NotifyError>;

/// Errors a notification channel can report
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("endpoint rejected notification (status {status}): {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, if any
        body: String,
    },

    /// Local write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be serialized
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Some channels of a fan-out failed
    #[error("{} of {total} channel(s) failed: {}", .failed.len(), .failed.join(", "))]
    Partial {
        /// Names of the channels that failed
        failed: Vec<String>,
        /// Number of channels attempted
        total: usize,
    },
}

impl NotifyError {
    /// Create a status error from code and body
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Check if the endpoint rejected the request (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if the endpoint failed (5xx)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_message_lists_channels() {
        let err = NotifyError::Partial {
            failed: vec!["webhook".to_string(), "bus".to_string()],
            total: 3,
        };
        assert_eq!(err.to_string(), "2 of 3 channel(s) failed: webhook, bus");
    }

    #[test]
    fn test_status_classification() {
        assert!(NotifyError::status(404, "missing").is_client_error());
        assert!(NotifyError::status(503, "down").is_server_error());
        assert!(!NotifyError::status(503, "down").is_client_error());
    }
}
