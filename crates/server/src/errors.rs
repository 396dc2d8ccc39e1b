use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use service::envelope::Envelope;
use service::errors::ErrorKind;
use thiserror::Error;
use tracing::error;

/// HTTP status for a failed envelope.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::WriteFailure | ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Envelope as an HTTP response: the body is always the envelope, the
/// status follows its failure kind.
#[derive(Debug)]
pub struct ApiResponse<T>(pub Envelope<T>);

impl<T> From<Envelope<T>> for ApiResponse<T> {
    fn from(env: Envelope<T>) -> Self { Self(env) }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            Some(kind) if !self.0.succeeded => status_for(kind),
            _ => StatusCode::OK,
        };
        (status, Json(self.0)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("runtime check failed: {0}")]
    Runtime(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

impl IntoResponse for StartupError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let msg = self.to_string();
        error!(error = %msg, "startup error");
        (status, Json(serde_json::json!({"error": msg}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service::errors::ServiceError;
    use uuid::Uuid;

    #[test]
    fn failure_kinds_map_to_statuses() {
        let cases = [
            (ServiceError::invalid("year", "is required"), StatusCode::BAD_REQUEST),
            (ServiceError::not_found("car", Uuid::nil()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("taken".into()), StatusCode::CONFLICT),
            (ServiceError::WriteFailure("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Infrastructure("db".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            let resp = ApiResponse(Envelope::<()>::failure(err)).into_response();
            assert_eq!(resp.status(), status);
        }
        assert_eq!(ApiResponse(Envelope::success(1)).into_response().status(), StatusCode::OK);
    }
}
