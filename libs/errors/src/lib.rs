//! Unified error handling for the terminal sync workspace
//!
//! Every crate in the workspace reports failures through [`SyncError`]. The
//! variants follow the reconciliation taxonomy: fetch failures against the
//! registry backend, validation failures raised before any network call,
//! parse failures on malformed incoming data, and configuration problems.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// ErrorInfo - operator-facing notification payload
// ============================================================================

/// Notification payload shown to the operator (toast, CLI message, API body)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorInfo {
    /// Error code (HTTP-like status)
    pub code: u16,
    /// Stable machine-readable error code
    pub error_code: String,
    /// Error message
    pub message: String,
    /// Detailed error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific errors for validation
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_errors: HashMap<String, Vec<String>>,
}

impl ErrorInfo {
    /// Create a new ErrorInfo with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: 500,
            error_code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
            details: None,
            field_errors: HashMap::new(),
        }
    }

    /// Set the status code
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    /// Set the machine-readable code
    pub fn with_error_code(mut self, error_code: &str) -> Self {
        self.error_code = error_code.to_string();
        self
    }

    /// Add details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Add a field error
    pub fn add_field_error(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(error.into());
        self
    }
}

// ============================================================================
// SyncError - Main error type
// ============================================================================

/// Main error type for the terminal sync workspace
#[derive(Debug, Error)]
pub enum SyncError {
    // ======================================
    // Fetch Errors (backend collaborator)
    // ======================================
    #[error("Fetch failed: {endpoint}: {reason}")]
    Fetch { endpoint: String, reason: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Unexpected payload from {endpoint}: {reason}")]
    UnexpectedPayload { endpoint: String, reason: String },

    #[error("Backend rejected request ({code}): {message}")]
    Backend { code: String, message: String },

    #[error("Submission failed: {0}")]
    Submit(String),

    // ======================================
    // Validation Errors (raised before any network call)
    // ======================================
    #[error("Please select a target terminal first")]
    NoTargetTerminal,

    #[error("Please map all source items first ({} unmapped)", .unmapped.len())]
    IncompleteMapping { unmapped: Vec<usize> },

    #[error("Target terminal is locked to {terminal}")]
    TargetLocked { terminal: String },

    #[error("Unknown mapping key: {0}")]
    UnknownKey(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // ======================================
    // Parse Errors
    // ======================================
    #[error("Parse error: {context}: {reason}")]
    Parse { context: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Session & Runtime Errors
    // ======================================
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Session is busy: {0}")]
    SessionBusy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SyncError
pub type SyncResult<T> = Result<T, SyncError>;

/// Error category, mirrors the operator-facing taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network, HTTP or backend payload failure
    Fetch,
    /// Operator input incomplete or not allowed
    Validation,
    /// Malformed data
    Parse,
    /// Configuration problem
    Config,
    /// Anything else
    Internal,
}

impl SyncError {
    /// Shorthand for a fetch failure against a named endpoint
    pub fn fetch(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a parse failure
    pub fn parse(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a missing resource
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch { .. }
            | Self::HttpClient(_)
            | Self::UnexpectedPayload { .. }
            | Self::Backend { .. }
            | Self::Submit(_) => ErrorCategory::Fetch,

            Self::NoTargetTerminal
            | Self::IncompleteMapping { .. }
            | Self::TargetLocked { .. }
            | Self::UnknownKey(_)
            | Self::Validation(_)
            | Self::NotFound { .. } => ErrorCategory::Validation,

            Self::Parse { .. } | Self::Serialization(_) => ErrorCategory::Parse,

            Self::Configuration(_) | Self::InvalidConfig { .. } => ErrorCategory::Config,

            Self::SessionClosed
            | Self::SessionBusy(_)
            | Self::Io(_)
            | Self::Internal(_)
            | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Stable code for logs and notifications
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "FETCH_FAILED",
            Self::HttpClient(_) => "HTTP_CLIENT_ERROR",
            Self::UnexpectedPayload { .. } => "UNEXPECTED_PAYLOAD",
            Self::Backend { .. } => "BACKEND_REJECTED",
            Self::Submit(_) => "SUBMIT_FAILED",
            Self::NoTargetTerminal => "NO_TARGET_TERMINAL",
            Self::IncompleteMapping { .. } => "INCOMPLETE_MAPPING",
            Self::TargetLocked { .. } => "TARGET_LOCKED",
            Self::UnknownKey(_) => "UNKNOWN_KEY",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::SessionBusy(_) => "SESSION_BUSY",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::Validation(_)
            | Self::UnknownKey(_)
            | Self::Parse { .. }
            | Self::Serialization(_) => 400,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 409 Conflict
            Self::TargetLocked { .. } | Self::SessionBusy(_) | Self::SessionClosed => 409,

            // 422 Unprocessable
            Self::NoTargetTerminal | Self::IncompleteMapping { .. } => 422,

            // 502 Bad Gateway
            Self::Fetch { .. }
            | Self::HttpClient(_)
            | Self::UnexpectedPayload { .. }
            | Self::Backend { .. }
            | Self::Submit(_) => 502,

            // 500 Internal Server Error
            Self::Configuration(_)
            | Self::InvalidConfig { .. }
            | Self::Io(_)
            | Self::Internal(_)
            | Self::Other(_) => 500,
        }
    }

    /// Whether repeating the same call could succeed.
    ///
    /// Informational only: nothing in the workspace retries on its own,
    /// the operator triggers a refresh or a new submission.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::Submit(_) => true,
            Self::HttpClient(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Convert to the operator-facing notification
    pub fn to_error_info(&self) -> ErrorInfo {
        let mut error_info = ErrorInfo::new(self.to_string())
            .with_code(self.status_code())
            .with_error_code(self.error_code());

        match self {
            Self::IncompleteMapping { unmapped } => {
                for index in unmapped {
                    error_info =
                        error_info.add_field_error(format!("incoming-{}", index), "unmapped");
                }
            },
            Self::InvalidConfig { field, reason } => {
                error_info = error_info.add_field_error(field, reason);
            },
            Self::Fetch { endpoint, .. } | Self::UnexpectedPayload { endpoint, .. } => {
                error_info = error_info.with_details(format!("endpoint: {}", endpoint));
            },
            Self::Backend { code, .. } => {
                error_info = error_info.with_details(format!("backend status: {}", code));
            },
            _ => {},
        }

        error_info
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for SyncError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::SyncError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::SyncError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::SyncError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::SyncError::Validation(format!($fmt, $($arg)*))
    };
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(SyncError::Validation("test".into()).status_code(), 400);
        assert_eq!(SyncError::not_found("terminal").status_code(), 404);
        assert_eq!(
            SyncError::IncompleteMapping { unmapped: vec![1] }.status_code(),
            422
        );
        assert_eq!(SyncError::fetch("detail", "refused").status_code(), 502);
        assert_eq!(SyncError::Internal("test".into()).status_code(), 500);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            SyncError::fetch("catalog", "boom").category(),
            ErrorCategory::Fetch
        );
        assert_eq!(
            SyncError::NoTargetTerminal.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            SyncError::parse("item", "eof").category(),
            ErrorCategory::Parse
        );
        assert_eq!(
            config_error!("missing {}", "base_url").category(),
            ErrorCategory::Config
        );
    }

    #[test]
    fn test_incomplete_mapping_message_names_requirement() {
        let error = SyncError::IncompleteMapping {
            unmapped: vec![0, 2],
        };
        assert!(error.to_string().contains("map all source items"));

        let info = error.to_error_info();
        assert_eq!(info.code, 422);
        assert_eq!(info.error_code, "INCOMPLETE_MAPPING");
        assert!(info.field_errors.contains_key("incoming-0"));
        assert!(info.field_errors.contains_key("incoming-2"));
        assert!(!info.field_errors.contains_key("incoming-1"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(SyncError::fetch("detail", "reset").is_retryable());
        assert!(!SyncError::NoTargetTerminal.is_retryable());
        assert!(!validation_error!("bad").is_retryable());
    }

    #[test]
    fn test_backend_error_info_details() {
        let info = SyncError::Backend {
            code: "05".into(),
            message: "terminal not free".into(),
        }
        .to_error_info();
        assert_eq!(info.details.as_deref(), Some("backend status: 05"));
    }
}
