//! HTTP mapping of [`AppError`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rw_core::error::AppError;
use serde_json::json;

/// Handler error. Wraps the domain error so it can become a response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn status_of(err: &AppError) -> StatusCode {
    match err {
        AppError::ValidationFailed(_) | AppError::PortalNotFound(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::NotFound(..) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        AppError::Store(_) | AppError::IntegrityViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        // Server-side detail stays in the log.
        let message = if self.0.is_internal() {
            tracing::error!(error = %self.0, code = self.0.code(), "request failed");
            match self.0 {
                AppError::Timeout => "The request took too long. Please try again.".to_string(),
                _ => "Something went wrong on our side.".to_string(),
            }
        } else {
            self.0.to_string()
        };

        (status, Json(json!({ "error": message, "code": self.0.code() }))).into_response()
    }
}
