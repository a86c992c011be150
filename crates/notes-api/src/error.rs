//! Request-boundary errors. Every failure leaves a handler as one of these and
//! is rendered as a JSON body with a `message`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::google::IdentityError;
use crate::otp::{OtpError, OtpRejection};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Verification for an email that has no account. Reported as a bad
    /// request rather than 404.
    #[error("User not found")]
    UnknownAccount,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid or expired OTP")]
    OtpInvalid(OtpRejection),

    #[error("{0}")]
    Dispatch(String),

    #[error("{0}")]
    UpstreamAuth(String),

    #[error("Server error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

/// Unreadable or mistyped request bodies are reported like any other bad input.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match &self {
            ApiError::Validation(_) | ApiError::UnknownAccount => {
                (StatusCode::BAD_REQUEST, json!({ "message": message }))
            }
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "message": message })),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, json!({ "message": message })),
            ApiError::OtpInvalid(rejection) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "message": message,
                    "expired": rejection.expired,
                    "reason": rejection.reason.as_str(),
                }),
            ),
            ApiError::Dispatch(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": message, "success": false }),
            ),
            ApiError::UpstreamAuth(_) => (StatusCode::BAD_REQUEST, json!({ "message": message })),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": message }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::UnknownEmail => ApiError::UnknownAccount,
            OtpError::Rejected(rejection) => ApiError::OtpInvalid(rejection),
            OtpError::Dispatch(_) => ApiError::Dispatch(
                "Failed to send OTP. Please check your email address and try again.".into(),
            ),
            OtpError::Store(e) => ApiError::Internal(e),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        warn!("External identity rejected: {}", err);
        match err {
            IdentityError::NotConfigured => {
                ApiError::UpstreamAuth("Google sign-in is not available".into())
            }
            _ => ApiError::UpstreamAuth("Invalid Google token".into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
