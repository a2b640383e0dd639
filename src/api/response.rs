use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Error;

/// Wire envelope for errors, stable across every caller-visible surface.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

/// HTTP status for each error kind in the taxonomy.
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation { .. } => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Conflict { .. } => StatusCode::CONFLICT,
        Error::InvalidState { .. } => StatusCode::CONFLICT,
        Error::Forbidden { .. } => StatusCode::FORBIDDEN,
        Error::Compilation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Publishing { .. } => StatusCode::BAD_GATEWAY,
        Error::Integrity { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn error_response(error: &Error) -> Response {
    let envelope = ErrorEnvelope {
        error: error.kind().to_string(),
        message: error.message().to_string(),
        details: error.details().clone(),
    };
    (status_for(error), Json(envelope)).into_response()
}

/// Wrapper that lets handlers return `Result<T>` directly.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(&self.0)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub catalog_fields: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_shape() {
        let error = Error::validation("bad tree", json!({"path": "$.and[0]"}));
        let envelope = ErrorEnvelope {
            error: error.kind().to_string(),
            message: error.message().to_string(),
            details: error.details().clone(),
        };
        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["error"], "ValidationError");
        assert_eq!(wire["message"], "bad tree");
        assert_eq!(wire["details"]["path"], "$.and[0]");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&Error::validation("x", Value::Null)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::forbidden("x", Value::Null)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(&Error::invalid_state("x", Value::Null)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&Error::publishing("x", Value::Null)),
            StatusCode::BAD_GATEWAY
        );
    }
}
