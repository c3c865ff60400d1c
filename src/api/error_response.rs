//! HTTP error response handling for the API.
//!
//! Converts domain errors to HTTP responses with appropriate status codes and
//! JSON error bodies, routing entirely through [`crate::error::ToHttpStatus`]
//! and [`crate::error::ApiError`] so every handler can just bubble errors up
//! with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{ApiError, Error, ToHttpStatus};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let api_error: ApiError = self.into();
        (status, Json(api_error)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Direct ApiError construction (rather than via `Error`) has no status
        // code to carry, so default to 500.
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, TaskError};

    #[test]
    fn not_found_maps_to_404() {
        let error = Error::NotFound("video 9".to_string());
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), "not_found");
    }

    #[test]
    fn task_invalid_state_maps_to_409() {
        let error = Error::Task(TaskError::InvalidState {
            id: 1,
            operation: "cancel".to_string(),
            current_state: "running".to_string(),
        });
        assert_eq!(error.status_code(), 409);
    }

    #[test]
    fn store_error_maps_to_500() {
        let error = Error::Store(StoreError::QueryFailed("boom".to_string()));
        assert_eq!(error.status_code(), 500);
    }

    #[tokio::test]
    async fn error_into_response_carries_status_and_body() {
        let error = Error::NotFound("task 7".to_string());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let api_error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(api_error.error.code, "not_found");
        assert!(api_error.error.message.contains("task 7"));
    }
}
