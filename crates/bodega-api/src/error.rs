//! Gateway error type.
//!
//! Converts store errors to the plaintext protocol responses at the
//! service boundary: `Bad request: …` (400), `Not found: …` (404), and
//! a generic 500 whose detail is logged but never sent to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use bodega_store::StoreError;

/// Request-scoped error, rendered as a plaintext response.
#[derive(Error, Debug)]
pub enum AppError {
    /// Client-attributable: unsafe path, directory upload target (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing file or directory (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Server-side fault (500). Detail is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PathSafety(msg) => Self::BadRequest(msg),
            StoreError::NotFound(target) => Self::NotFound(target),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "internal server error");
        }

        let (status, body) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, format!("Bad request: {msg}\n")),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, format!("Not found: {msg}\n")),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error\n".to_string(),
            ),
        };
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http_body_util::BodyExt;

    async fn parts(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn bad_request_body_format() {
        let (status, body) = parts(AppError::BadRequest("trailing slash".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Bad request: trailing slash\n");
    }

    #[tokio::test]
    async fn not_found_body_format() {
        let (status, body) = parts(AppError::NotFound("a/b/c/missing.txt".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Not found: a/b/c/missing.txt\n");
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let (status, body) = parts(AppError::Internal("disk on fire".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Internal server error\n");
        assert!(!body.contains("disk"));
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let e: AppError = StoreError::PathSafety("escape".into()).into();
        assert!(matches!(e, AppError::BadRequest(_)));

        let e: AppError = StoreError::NotFound("x".into()).into();
        assert!(matches!(e, AppError::NotFound(_)));

        let e: AppError = StoreError::Write {
            path: "p".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        }
        .into();
        assert!(matches!(e, AppError::Internal(_)));
    }
}
