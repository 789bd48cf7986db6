//! OAuth2 federation with Google
//!
//! Runs the provider dance — PKCE authorization, code exchange, userinfo
//! fetch — and reduces the result to the profile the backend's federated
//! login expects. Whether that profile maps to an existing account is the
//! backend's call, not ours.

use anyhow::Result;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;
use tracing::info;

use crate::backend::FederatedProfile;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// OAuth2 client for the Google provider
#[derive(Clone)]
pub struct OAuthClient {
    client: BasicClient,
    http: reqwest::Client,
}

/// Google user profile response
#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl OAuthClient {
    /// Create a new OAuth2 client for Google
    pub fn new_google(client_id: String, client_secret: String, redirect_url: String) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())?,
            Some(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?),
        )
        .set_redirect_uri(RedirectUrl::new(redirect_url)?);

        Ok(Self {
            client,
            http: reqwest::Client::new(),
        })
    }

    /// Generate the authorization URL with PKCE for the browser redirect.
    pub fn authorization_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchange the callback code and fetch the user's profile.
    pub async fn fetch_profile(&self, code: String, verifier: String) -> Result<FederatedProfile> {
        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(oauth2::reqwest::async_http_client)
            .await?;

        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token_response.access_token().secret())
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch Google user profile: {}", response.status());
        }

        let user: GoogleUser = response.json().await?;
        info!("Fetched Google profile for {}", user.email);

        Ok(FederatedProfile {
            email: user.email,
            name: user.name,
            avatar_url: user.picture,
        })
    }
}
