use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bm25_core::ErrorKind;
use serde_json::json;

/// Handler error rendered as `{"error": "..."}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl From<bm25_core::Error> for ApiError {
    fn from(err: bm25_core::Error) -> Self {
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::Validation | ErrorKind::Schema => ApiError::BadRequest(msg),
            ErrorKind::NotFound => ApiError::NotFound(msg),
            ErrorKind::DuplicateDocument | ErrorKind::EmptyCorpus => ApiError::Conflict(msg),
            ErrorKind::Cancelled => ApiError::Unavailable(msg),
            ErrorKind::Storage => {
                tracing::error!(error = %msg, "storage failure");
                ApiError::Internal(msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let status = |e: bm25_core::Error| ApiError::from(e).into_response().status();
        assert_eq!(status(bm25_core::Error::NotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status(bm25_core::Error::EmptyCorpus), StatusCode::CONFLICT);
        assert_eq!(status(bm25_core::Error::DuplicateDocument(1)), StatusCode::CONFLICT);
        assert_eq!(status(bm25_core::Error::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(bm25_core::Error::Cancelled), StatusCode::SERVICE_UNAVAILABLE);
    }
}
