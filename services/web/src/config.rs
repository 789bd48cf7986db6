//! Service configuration
//!
//! Settings are read from `WEB_`-prefixed environment variables. Everything
//! has a development default except the session secret, which must be
//! provided explicitly.

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

/// Runtime settings for the web front-end service
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Address the HTTP server binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the trading backend
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Path prefix the backend mounts its API under
    #[serde(default = "default_api_prefix")]
    pub backend_api_prefix: String,

    /// Secret used to sign session tokens; required, no default
    pub session_secret: String,

    /// Session lifetime in days, extended on every use
    #[serde(default = "default_session_days")]
    pub session_days: i64,

    /// Whether session cookies are marked `Secure`
    #[serde(default)]
    pub cookie_secure: bool,

    /// Google OAuth client id; the provider flow is disabled when absent
    #[serde(default)]
    pub google_client_id: Option<String>,

    /// Google OAuth client secret
    #[serde(default)]
    pub google_client_secret: Option<String>,

    /// Redirect URL registered for the Google OAuth client
    #[serde(default)]
    pub google_redirect_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_api_prefix() -> String {
    "v1".to_string()
}

fn default_session_days() -> i64 {
    7
}

impl Settings {
    /// Load settings from `WEB_`-prefixed environment variables
    ///
    /// # Environment Variables
    /// - `WEB_BIND_ADDR`: listen address (default: "0.0.0.0:3000")
    /// - `WEB_BACKEND_URL`: backend base URL (default: "http://localhost:8000")
    /// - `WEB_BACKEND_API_PREFIX`: backend API path prefix (default: "v1")
    /// - `WEB_SESSION_SECRET`: session signing secret (required)
    /// - `WEB_SESSION_DAYS`: session lifetime in days (default: 7)
    /// - `WEB_COOKIE_SECURE`: mark cookies `Secure` (default: false)
    /// - `WEB_GOOGLE_CLIENT_ID` / `WEB_GOOGLE_CLIENT_SECRET` /
    ///   `WEB_GOOGLE_REDIRECT_URL`: Google OAuth client (optional)
    pub fn from_env() -> Result<Self> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("WEB").try_parsing(true))
            .build()
            .context("Failed to read environment configuration")?;

        config
            .try_deserialize()
            .context("Invalid service configuration")
    }
}
