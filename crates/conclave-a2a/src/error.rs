//! Agent-invocation protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type A2aResult<T> = Result<T, A2aError>;

/// Errors that can occur in agent-invocation protocol operations.
#[derive(Debug, Error)]
pub enum A2aError {
    /// A task with this id is already in flight
    #[error("Task already running: {task_id}")]
    TaskAlreadyRunning { task_id: String },

    /// The remote agent could not be reached
    #[error("Agent unreachable: {message}")]
    AgentUnreachable { message: String },

    /// Request timeout
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Protocol error (malformed payloads, unexpected status codes)
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl A2aError {
    /// Create a task-already-running error.
    pub fn task_already_running(task_id: impl Into<String>) -> Self {
        Self::TaskAlreadyRunning {
            task_id: task_id.into(),
        }
    }

    /// Create an agent-unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::AgentUnreachable {
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            A2aError::AgentUnreachable { .. } | A2aError::Timeout { .. }
        )
    }
}

/// Wire form for protocol errors.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// HTTP-style error code
    pub code: u16,
    /// Error message
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<A2aError> for ErrorResponse {
    fn from(err: A2aError) -> Self {
        let code = match &err {
            A2aError::TaskAlreadyRunning { .. } => 409,
            A2aError::AgentUnreachable { .. } => 502,
            A2aError::Timeout { .. } => 504,
            A2aError::Protocol { .. } => 400,
            A2aError::Serialization(_) => 400,
            A2aError::Url(_) => 400,
            A2aError::Internal { .. } => 500,
        };
        ErrorResponse::new(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = A2aError::task_already_running("t-1");
        assert_eq!(err.to_string(), "Task already running: t-1");
    }

    #[test]
    fn test_error_retryable() {
        assert!(A2aError::unreachable("connection refused").is_retryable());
        assert!(A2aError::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(!A2aError::protocol("bad payload").is_retryable());
    }

    #[test]
    fn test_error_response_codes() {
        let response: ErrorResponse = A2aError::task_already_running("t-1").into();
        assert_eq!(response.code, 409);

        let response: ErrorResponse = A2aError::unreachable("down").into();
        assert_eq!(response.code, 502);
    }
}
