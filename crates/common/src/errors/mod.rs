//! Error types for ScholarLens
//!
//! Provides a single error enum shared by the dataset store, the query
//! tools, the agent loop and the HTTP gateway:
//! - Distinct error types for each failure class
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! Empty aggregates are not errors; analytics return zero/null values.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller errors (1xxx)
    InvalidRequest,
    InvalidToolArgument,
    UnknownTool,

    // Rate limiting (6xxx)
    RateLimited,

    // Data errors (7xxx)
    DataUnavailable,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamTimeout,
    AgentLoopExceeded,

    // Internal errors (9xxx)
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 1001,
            ErrorCode::InvalidToolArgument => 1002,
            ErrorCode::UnknownTool => 1003,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DataUnavailable => 7001,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamTimeout => 8002,
            ErrorCode::AgentLoopExceeded => 8003,

            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Caller errors
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid argument for tool '{tool}': {message}")]
    InvalidToolArgument { tool: String, message: String },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Dataset errors (fatal at startup)
    #[error("Dataset table '{table}' unavailable: {message}")]
    DataUnavailable { table: String, message: String },

    // External reasoning service errors
    #[error("Reasoning service error: {message}")]
    Upstream { message: String, retryable: bool },

    #[error("Reasoning service timed out after {timeout_ms}ms")]
    UpstreamTimeout { timeout_ms: u64 },

    #[error("Agent loop exceeded {max_iterations} reasoning iterations")]
    AgentLoopExceeded { max_iterations: usize },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Shorthand for a request validation failure on one field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::InvalidRequest {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            AppError::InvalidToolArgument { .. } => ErrorCode::InvalidToolArgument,
            AppError::UnknownTool { .. } => ErrorCode::UnknownTool,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::DataUnavailable { .. } => ErrorCode::DataUnavailable,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::AgentLoopExceeded { .. } => ErrorCode::AgentLoopExceeded,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::InvalidRequest { .. }
            | AppError::InvalidToolArgument { .. }
            | AppError::UnknownTool { .. } => StatusCode::BAD_REQUEST,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Configuration { .. } | AppError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 502 Bad Gateway
            AppError::Upstream { .. } | AppError::AgentLoopExceeded { .. } => {
                StatusCode::BAD_GATEWAY
            }

            // 503 Service Unavailable
            AppError::DataUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,

            // 504 Gateway Timeout
            AppError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Whether a failed reasoning call may be attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Upstream { retryable, .. } => *retryable,
            AppError::UpstreamTimeout { .. } => true,
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Render as the JSON body used by both HTTP responses and tool results
    pub fn to_body(&self) -> ErrorResponse {
        let details = match self {
            AppError::InvalidRequest { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            AppError::InvalidToolArgument { tool, .. } => {
                Some(serde_json::json!({ "tool": tool }))
            }
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetails {
                code: self.code(),
                message: self.to_string(),
                details,
            },
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        (status, Json(self.to_body())).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidRequest {
            message: err.to_string(),
            field: err.field_errors().keys().next().map(|k| k.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::UpstreamTimeout { timeout_ms: 0 };
        }
        let retryable = err.is_connect()
            || err.is_request()
            || err
                .status()
                .map(|s| s.is_server_error() || s.as_u16() == 429 || s.as_u16() == 408)
                .unwrap_or(false);
        AppError::Upstream {
            message: err.to_string(),
            retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::UnknownTool { name: "drop-tables".into() };
        assert_eq!(err.code(), ErrorCode::UnknownTool);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code().as_code(), 1003);
    }

    #[test]
    fn test_tool_argument_error_is_client_error() {
        let err = AppError::InvalidToolArgument {
            tool: "top-authors".into(),
            message: "n must be between 1 and 100".into(),
        };
        assert!(err.is_client_error());
        assert!(!err.is_server_error());

        let body = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(body["error"]["code"], "INVALID_TOOL_ARGUMENT");
        assert_eq!(body["error"]["details"]["tool"], "top-authors");
    }

    #[test]
    fn test_data_unavailable_is_server_error() {
        let err = AppError::DataUnavailable {
            table: "papers".into(),
            message: "missing".into(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_status_and_numeric_codes() {
        let cases = [
            (AppError::invalid_field("year", "bad"), StatusCode::BAD_REQUEST, 1001),
            (AppError::RateLimited { limit: 5 }, StatusCode::TOO_MANY_REQUESTS, 6001),
            (AppError::AgentLoopExceeded { max_iterations: 5 }, StatusCode::BAD_GATEWAY, 8003),
            (AppError::UpstreamTimeout { timeout_ms: 10 }, StatusCode::GATEWAY_TIMEOUT, 8002),
            (
                AppError::Configuration { message: "no key".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
                9002,
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
            assert_eq!(err.code().as_code(), code, "{}", err);
            assert_ne!(err.status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_retryable_classes() {
        assert!(AppError::UpstreamTimeout { timeout_ms: 100 }.is_retryable());
        assert!(AppError::Upstream { message: "503".into(), retryable: true }.is_retryable());
        assert!(!AppError::Upstream { message: "401".into(), retryable: false }.is_retryable());
        assert!(!AppError::AgentLoopExceeded { max_iterations: 5 }.is_retryable());
    }
}
