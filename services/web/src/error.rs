//! Custom error types for the web front-end service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::AuthError;
use serde_json::json;
use thiserror::Error;

/// Custom error type for request handling
#[derive(Error, Debug)]
pub enum WebError {
    /// No usable session accompanies the request
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Login attempts exhausted for this identifier
    #[error("Too many login attempts")]
    TooManyAttempts,

    /// Federated sign-in is not configured on this deployment
    #[error("Federated sign-in is not configured")]
    OAuthNotConfigured,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Authentication failure surfaced from the backend bridge
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            WebError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            WebError::TooManyAttempts => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts, try again later".to_string(),
            ),
            WebError::OAuthNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Federated sign-in is not configured".to_string(),
            ),
            WebError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            WebError::Auth(err) => auth_response(&err),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Map an authentication failure to a client-safe status and message.
///
/// Backend detail never reaches the caller; the split is only "bad
/// credentials" versus "try again later".
fn auth_response(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::FederationFailed => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::RefreshFailed | AuthError::SessionInvalid => {
            (StatusCode::UNAUTHORIZED, "Session is no longer valid".to_string())
        }
        AuthError::MalformedUpstreamResponse(_) => (
            StatusCode::BAD_GATEWAY,
            "Backend returned an unexpected response".to_string(),
        ),
        AuthError::ProxyUnavailable(_) => (
            StatusCode::BAD_GATEWAY,
            "Backend is unavailable, try again later".to_string(),
        ),
    }
}

/// Type alias for handler results
pub type WebResult<T> = Result<T, WebError>;
