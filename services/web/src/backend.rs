//! Backend auth client
//!
//! The three outbound calls the session layer makes against the trading
//! backend: password login, federated login, and token refresh. Responses
//! are normalized into typed structs; non-JSON or truncated bodies are
//! reported as failures, never propagated as panics.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use common::error::{AuthError, AuthResult};

/// Timeout applied to every backend call
const BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Response to a successful password login
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub subject_id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Response to a federated login exchange
///
/// Tokens and subject are present only when the identity maps to an
/// existing backend account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationResponse {
    pub is_new_account: bool,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub subject_id: Option<Uuid>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Response to a token refresh; the refresh token is present only when the
/// backend rotated it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Profile handed to the backend on a federated login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// The outbound calls the session layer depends on
///
/// Object-safe so handlers and tests can swap the HTTP implementation for
/// a scripted one.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Exchange an identifier/password pair for a token bundle.
    ///
    /// Any non-success status reads as `InvalidCredentials`; backend status
    /// text is never surfaced to the caller.
    async fn password_login(
        &self,
        identifier: &str,
        password: &str,
    ) -> AuthResult<CredentialResponse>;

    /// Exchange a federation-supplied profile for either a token bundle or
    /// a new-account marker.
    async fn federated_login(
        &self,
        profile: &FederatedProfile,
    ) -> AuthResult<FederationResponse>;

    /// Exchange a refresh token for a fresh access token.
    ///
    /// An explicit backend rejection maps to `RefreshFailed`; a transport
    /// failure maps to `ProxyUnavailable` so callers can treat the two
    /// differently.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshResponse>;
}

/// HTTP implementation of [`BackendClient`]
#[derive(Clone)]
pub struct HttpBackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackendClient {
    /// Create a client against the given backend base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(BACKEND_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn password_login(
        &self,
        identifier: &str,
        password: &str,
    ) -> AuthResult<CredentialResponse> {
        let url = format!("{}/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&LoginBody { identifier, password })
            .send()
            .await
            .map_err(|e| AuthError::ProxyUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            info!("Backend rejected password login for {}", identifier);
            return Err(AuthError::InvalidCredentials);
        }

        response
            .json::<CredentialResponse>()
            .await
            .map_err(|e| AuthError::MalformedUpstreamResponse(e.to_string()))
    }

    async fn federated_login(
        &self,
        profile: &FederatedProfile,
    ) -> AuthResult<FederationResponse> {
        let url = format!("{}/federated-login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(profile)
            .send()
            .await
            .map_err(|e| AuthError::ProxyUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            info!("Backend rejected federated login for {}", profile.email);
            return Err(AuthError::FederationFailed);
        }

        response
            .json::<FederationResponse>()
            .await
            .map_err(|e| AuthError::MalformedUpstreamResponse(e.to_string()))
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshResponse> {
        let url = format!("{}/token/refresh", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&RefreshBody { refresh_token })
            .send()
            .await
            .map_err(|e| AuthError::ProxyUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::RefreshFailed);
        }

        response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| AuthError::MalformedUpstreamResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_response_decodes_camel_case() {
        let body = r#"{
            "accessToken": "acc",
            "refreshToken": "ref",
            "subjectId": "7f7c2a2e-4f60-4d3a-9e1a-0b8a1f4de0aa",
            "username": "star1",
            "email": "star1@example.com",
            "displayName": "Star One"
        }"#;

        let decoded: CredentialResponse = serde_json::from_str(body).expect("should decode");
        assert_eq!(decoded.access_token, "acc");
        assert_eq!(decoded.refresh_token, "ref");
        assert_eq!(decoded.username, "star1");
        assert_eq!(decoded.display_name.as_deref(), Some("Star One"));
        assert_eq!(decoded.avatar_url, None);
    }

    #[test]
    fn federation_response_tolerates_missing_tokens_for_new_accounts() {
        let body = r#"{
            "isNewAccount": true,
            "email": "new@example.com",
            "name": "New Person",
            "avatarUrl": "https://img.example.com/p.png"
        }"#;

        let decoded: FederationResponse = serde_json::from_str(body).expect("should decode");
        assert!(decoded.is_new_account);
        assert_eq!(decoded.access_token, None);
        assert_eq!(decoded.refresh_token, None);
        assert_eq!(decoded.subject_id, None);
    }

    #[test]
    fn refresh_response_without_rotation_decodes() {
        let decoded: RefreshResponse =
            serde_json::from_str(r#"{"accessToken": "fresh"}"#).expect("should decode");
        assert_eq!(decoded.access_token, "fresh");
        assert_eq!(decoded.refresh_token, None);
    }

    #[test]
    fn truncated_body_is_a_decode_error_not_a_panic() {
        let result = serde_json::from_str::<CredentialResponse>(r#"{"accessToken": "acc""#);
        assert!(result.is_err());
    }
}
