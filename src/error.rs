//! Error types for vidqueue
//!
//! This module provides the error taxonomy for the library, including:
//! - Domain-specific error families (store, task, media backend)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for vidqueue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vidqueue
///
/// Each variant maps to one of the taxonomy families described in the design docs:
/// not-found, validation, conflict, transient, permanent, fatal.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_sync_workers")
        key: Option<String>,
    },

    /// Store-level error (query, constraint, migration)
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Task-queue error (state machine, lease, retry)
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Media backend error (extraction/download subprocess)
    #[error("media backend error: {0}")]
    MediaBackend(#[from] MediaBackendError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input that never reaches a core handler
    #[error("validation error: {0}")]
    Validation(String),

    /// Duplicate unique constraint or already-active task
    #[error("conflict: {0}")]
    Conflict(String),

    /// Shutdown in progress - not accepting new work
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Notifier delivery error (always logged, never propagated to callers)
    #[error("notifier error: {0}")]
    Notifier(String),

    /// Network error (webhook delivery, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Store-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate list url, duplicate profile name)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Task-queue-related errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found in the store
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: i64,
    },

    /// No handler registered for this task type
    #[error("no handler registered for task type: {task_type}")]
    NoHandler {
        /// The task type string (e.g. "sync", "download")
        task_type: String,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: i64,
        /// The operation that was attempted (e.g., "cancel", "retry")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },

    /// An active task already targets this (task_type, entity_id) pair
    #[error("an active task already targets {task_type} entity {entity_id}")]
    AlreadyActive {
        /// The task type
        task_type: String,
        /// The weakly-referenced entity id
        entity_id: i64,
    },
}

/// Media backend (extraction/download subprocess) errors
#[derive(Debug, Error)]
pub enum MediaBackendError {
    /// Extraction of list/channel metadata failed
    #[error("extraction failed for {url}: {reason}")]
    ExtractionFailed {
        /// The source URL that failed to extract
        url: String,
        /// The reason extraction failed
        reason: String,
    },

    /// Video download failed
    #[error("download failed for {video_id}: {reason}")]
    DownloadFailed {
        /// The external video id that failed to download
        video_id: String,
        /// The reason the download failed
        reason: String,
    },

    /// The backend process could not be spawned or exited non-zero unexpectedly
    #[error("backend process error: {0}")]
    ProcessFailed(String),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
/// It follows a standard format with machine-readable error codes,
/// human-readable messages, and optional contextual details.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "not_found",
///     "message": "video 123 not found",
///     "details": {
///       "video_id": 123
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create a "conflict" error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    /// Create an "unauthorized" error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    /// Create a "service unavailable" error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("service_unavailable", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Task(TaskError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Conflict(_) => 409,
            Error::Task(TaskError::InvalidState { .. }) => 409,
            Error::Task(TaskError::AlreadyActive { .. }) => 409,

            // 422 Unprocessable Entity
            Error::Task(TaskError::NoHandler { .. }) => 422,

            // 500 Internal Server Error
            Error::Store(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - external collaborator errors
            Error::MediaBackend(_) => 502,
            Error::Network(_) => 502,
            Error::Notifier(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Store(_) => "store_error",
            Error::Sqlx(_) => "store_error",
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::NoHandler { .. } => "no_handler",
                TaskError::InvalidState { .. } => "invalid_state",
                TaskError::AlreadyActive { .. } => "already_active",
            },
            Error::MediaBackend(e) => match e {
                MediaBackendError::ExtractionFailed { .. } => "extraction_failed",
                MediaBackendError::DownloadFailed { .. } => "download_failed",
                MediaBackendError::ProcessFailed(_) => "backend_process_failed",
            },
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::ShuttingDown => "shutting_down",
            Error::Notifier(_) => "notifier_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Task(TaskError::NotFound { id }) => Some(serde_json::json!({ "task_id": id })),
            Error::Task(TaskError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "task_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Task(TaskError::AlreadyActive {
                task_type,
                entity_id,
            }) => Some(serde_json::json!({
                "task_type": task_type,
                "entity_id": entity_id,
            })),
            Error::MediaBackend(MediaBackendError::DownloadFailed { video_id, .. }) => {
                Some(serde_json::json!({ "video_id": video_id }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad value".into(),
                    key: Some("max_sync_workers".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::Validation("unknown sponsorblock category".into()),
                400,
                "validation_error",
            ),
            (Error::Conflict("list url already exists".into()), 409, "conflict"),
            (Error::NotFound("video 99".into()), 404, "not_found"),
            (
                Error::Store(StoreError::QueryFailed("timeout".into())),
                500,
                "store_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::Notifier("webhook timed out".into()),
                502,
                "notifier_error",
            ),
            (
                Error::Task(TaskError::NotFound { id: 42 }),
                404,
                "task_not_found",
            ),
            (
                Error::Task(TaskError::NoHandler {
                    task_type: "sync".into(),
                }),
                422,
                "no_handler",
            ),
            (
                Error::Task(TaskError::InvalidState {
                    id: 42,
                    operation: "cancel".into(),
                    current_state: "running".into(),
                }),
                409,
                "invalid_state",
            ),
            (
                Error::Task(TaskError::AlreadyActive {
                    task_type: "download".into(),
                    entity_id: 7,
                }),
                409,
                "already_active",
            ),
            (
                Error::MediaBackend(MediaBackendError::ExtractionFailed {
                    url: "https://example.com/channel".into(),
                    reason: "timeout".into(),
                }),
                502,
                "extraction_failed",
            ),
            (
                Error::MediaBackend(MediaBackendError::DownloadFailed {
                    video_id: "abc123".into(),
                    reason: "404".into(),
                }),
                502,
                "download_failed",
            ),
            (
                Error::MediaBackend(MediaBackendError::ProcessFailed("spawn failed".into())),
                502,
                "backend_process_failed",
            ),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_code() {
        for (error, expected_status, expected_code) in all_error_variants() {
            let actual_status = error.status_code();
            assert_eq!(
                actual_status, expected_status,
                "Error variant with error_code={expected_code} returned status {actual_status}, expected {expected_status}"
            );
        }
    }

    #[test]
    fn every_variant_maps_to_expected_error_code() {
        for (error, expected_status, expected_code) in all_error_variants() {
            let actual_code = error.error_code();
            assert_eq!(
                actual_code, expected_code,
                "Error variant with expected status={expected_status} returned error_code={actual_code}, expected {expected_code}"
            );
        }
    }

    #[test]
    fn task_invalid_state_is_409_not_422() {
        let err = Error::Task(TaskError::InvalidState {
            id: 1,
            operation: "cancel".into(),
            current_state: "running".into(),
        });
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn media_backend_errors_are_502_bad_gateway() {
        let err = Error::MediaBackend(MediaBackendError::ProcessFailed("crash".into()));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn api_error_from_task_not_found_has_task_id() {
        let err = Error::Task(TaskError::NotFound { id: 42 });
        let api: ApiError = err.into();

        assert_eq!(api.error.code, "task_not_found");
        let details = api.error.details.expect("should have details");
        assert_eq!(details["task_id"], 42);
    }

    #[test]
    fn api_error_from_already_active_has_task_type_and_entity_id() {
        let err = Error::Task(TaskError::AlreadyActive {
            task_type: "sync".into(),
            entity_id: 7,
        });
        let api: ApiError = err.into();

        assert_eq!(api.error.code, "already_active");
        let details = api.error.details.expect("should have details");
        assert_eq!(details["task_type"], "sync");
        assert_eq!(details["entity_id"], 7);
    }

    #[test]
    fn api_error_from_invalid_state_has_operation_and_current_state() {
        let err = Error::Task(TaskError::InvalidState {
            id: 3,
            operation: "cancel".into(),
            current_state: "running".into(),
        });
        let api: ApiError = err.into();

        assert_eq!(api.error.code, "invalid_state");
        let details = api.error.details.expect("should have details");
        assert_eq!(details["task_id"], 3);
        assert_eq!(details["operation"], "cancel");
        assert_eq!(details["current_state"], "running");
    }

    #[test]
    fn api_error_from_io_has_no_details() {
        let err = Error::Io(std::io::Error::other("disk fail"));
        let api: ApiError = err.into();

        assert_eq!(api.error.code, "io_error");
        assert!(api.error.details.is_none());
    }

    #[test]
    fn api_error_from_shutting_down_has_no_details() {
        let api: ApiError = Error::ShuttingDown.into();

        assert_eq!(api.error.code, "shutting_down");
        assert!(api.error.details.is_none());
    }

    #[test]
    fn api_error_not_found_factory() {
        let api = ApiError::not_found("Video 123");

        assert_eq!(api.error.code, "not_found");
        assert_eq!(api.error.message, "Video 123 not found");
        assert!(api.error.details.is_none());
    }

    #[test]
    fn api_error_validation_factory() {
        let api = ApiError::validation("name is required");

        assert_eq!(api.error.code, "validation_error");
        assert_eq!(api.error.message, "name is required");
    }

    #[test]
    fn with_details_preserves_json_object() {
        let details = serde_json::json!({ "video_id": 42, "retries": 3 });
        let api = ApiError::with_details("custom_error", "something broke", details.clone());

        assert_eq!(api.error.code, "custom_error");
        let actual_details = api.error.details.expect("details should be present");
        assert_eq!(actual_details, details);
    }

    #[test]
    fn api_error_without_details_omits_details_in_json() {
        let api = ApiError::new("test_code", "test message");

        let json_str = serde_json::to_string(&api).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();

        assert!(parsed["error"].get("details").is_none());
    }

    #[test]
    fn api_error_round_trips_through_json() {
        let original = ApiError::with_details(
            "not_found",
            "Video 42 not found",
            serde_json::json!({"video_id": 42}),
        );

        let json_str = serde_json::to_string(&original).unwrap();
        let deserialized: ApiError = serde_json::from_str(&json_str).unwrap();

        assert_eq!(deserialized.error.code, original.error.code);
        assert_eq!(deserialized.error.message, original.error.message);
        assert_eq!(deserialized.error.details, original.error.details);
    }

    #[test]
    fn api_error_message_matches_error_display() {
        let err = Error::Task(TaskError::InvalidState {
            id: 5,
            operation: "cancel".into(),
            current_state: "running".into(),
        });
        let display_msg = err.to_string();
        let api: ApiError = err.into();

        assert_eq!(api.error.message, display_msg);
    }
}
