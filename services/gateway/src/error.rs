use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use session::SessionError;
use thiserror::Error;
use types::errors::ValidationError;

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    /// Request refused by validation or by the session; reported in-band
    #[error("{0}")]
    Rejected(String),

    /// The session runtime has stopped
    #[error("session unavailable")]
    Unavailable,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Rejected(err.to_string())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::RuntimeUnavailable => AppError::Unavailable,
            other => AppError::Rejected(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            // Clients branch on `result`, not on the HTTP status.
            AppError::Rejected(_) => StatusCode::OK,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "result": false,
            "err_msg": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_keeps_message() {
        let err: AppError = ValidationError::InvalidVolume.into();
        assert_eq!(err.to_string(), "invalid volume");
        assert_eq!(err.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_unavailable_runtime_is_503() {
        let err: AppError = SessionError::RuntimeUnavailable.into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
