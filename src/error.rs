use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::sandbox::SandboxError;
use crate::services::{CallbackError, CheckoutError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Gone(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let AppError::Storage(e) = &self {
            tracing::error!(error = %e, "storage failure while handling request");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<CallbackError> for AppError {
    fn from(err: CallbackError) -> Self {
        match err {
            CallbackError::InvalidRequest => AppError::BadRequest(err.to_string()),
            CallbackError::OrderNotFound => AppError::NotFound(err.to_string()),
            CallbackError::InvalidOrderKey => AppError::Forbidden(err.to_string()),
            CallbackError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl From<SandboxError> for AppError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::InvalidParameters => AppError::BadRequest(err.to_string()),
            SandboxError::SessionExpired => AppError::Gone(err.to_string()),
            SandboxError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::OrderNotFound => AppError::NotFound(err.to_string()),
            CheckoutError::GatewayUnavailable => AppError::ServiceUnavailable(err.to_string()),
            CheckoutError::AlreadyPaid => AppError::Conflict(err.to_string()),
            CheckoutError::InvalidAmount => AppError::BadRequest(err.to_string()),
            CheckoutError::Storage(e) => AppError::Storage(e),
            // Processor failures are answered by the checkout handler itself.
            CheckoutError::Payment(_) => AppError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_errors_map_to_distinct_statuses() {
        let cases = [
            (CallbackError::InvalidRequest, StatusCode::BAD_REQUEST),
            (CallbackError::OrderNotFound, StatusCode::NOT_FOUND),
            (CallbackError::InvalidOrderKey, StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_sandbox_errors() {
        assert_eq!(
            AppError::from(SandboxError::SessionExpired).status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            AppError::from(SandboxError::InvalidParameters).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_checkout_errors_map_to_distinct_statuses() {
        let cases = [
            (CheckoutError::OrderNotFound, StatusCode::NOT_FOUND),
            (CheckoutError::GatewayUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (CheckoutError::AlreadyPaid, StatusCode::CONFLICT),
            (CheckoutError::InvalidAmount, StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_storage_error_is_internal() {
        let error = AppError::Storage(RepositoryError::Database(sqlx::Error::RowNotFound));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_carries_message_and_status() {
        let response = AppError::from(CallbackError::InvalidOrderKey).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Invalid order key.");
        assert_eq!(json["status"], 403);
    }
}
