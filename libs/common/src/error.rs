//! Custom error types for the common library
//!
//! This module defines the authentication and proxying error taxonomy
//! shared across the web front-end.

use thiserror::Error;

/// Custom error type for authentication and backend communication
#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend rejected the submitted credentials
    #[error("Invalid identifier or password")]
    InvalidCredentials,

    /// The backend rejected a federated login exchange
    #[error("Federated login failed")]
    FederationFailed,

    /// The backend rejected the refresh token
    #[error("Token refresh failed")]
    RefreshFailed,

    /// The backend answered with a body that could not be decoded
    #[error("Malformed backend response: {0}")]
    MalformedUpstreamResponse(String),

    /// The backend could not be reached
    #[error("Backend unavailable: {0}")]
    ProxyUnavailable(String),

    /// The session no longer carries usable token material
    #[error("Session is no longer valid")]
    SessionInvalid,
}

/// Type alias for Result with AuthError
pub type AuthResult<T> = Result<T, AuthError>;
