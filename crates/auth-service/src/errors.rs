//! Auth service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Authentication and authorization failures are both 401; infrastructure
//! failures are 500 with a generic client message and the cause logged
//! server-side.

use crate::auth::jwks::FetchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Auth service error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated, Forbidden: 401 Unauthorized
/// - KeySetUnavailable: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Unauthenticated(_) | AuthError::Forbidden(_) => 401,
            AuthError::KeySetUnavailable(_) => 500,
        }
    }
}

impl From<FetchError> for AuthError {
    fn from(err: FetchError) -> Self {
        AuthError::KeySetUnavailable(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::Unauthenticated(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", reason.clone())
            }
            AuthError::Forbidden(reason) => (StatusCode::UNAUTHORIZED, "FORBIDDEN", reason.clone()),
            AuthError::KeySetUnavailable(reason) => {
                // Log actual reason server-side
                tracing::error!(target: "auth.errors", reason = %reason, "Verification keys unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "KEY_SET_UNAVAILABLE",
                    "Authentication is temporarily unavailable".to_string(),
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"ratatieto-extranet\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
