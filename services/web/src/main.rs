use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod backend;
mod config;
mod error;
mod jwt;
mod models;
mod oauth;
mod proxy;
mod rate_limiter;
mod routes;
mod session;
mod validation;

use crate::backend::{BackendClient, HttpBackendClient};
use crate::config::Settings;
use crate::jwt::SessionCodec;
use crate::oauth::OAuthClient;
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};

/// Timeout applied to proxied backend calls
const PROXY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub backend: Arc<dyn BackendClient>,
    pub http: reqwest::Client,
    pub sessions: SessionCodec,
    pub oauth: Option<OAuthClient>,
    pub rate_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting web front-end service");

    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();

    let sessions = SessionCodec::new(
        &settings.session_secret,
        settings.session_days,
        settings.cookie_secure,
    );
    let backend = Arc::new(HttpBackendClient::new(&settings.backend_url)?);
    let http = reqwest::Client::builder().timeout(PROXY_TIMEOUT).build()?;

    let oauth = match (
        &settings.google_client_id,
        &settings.google_client_secret,
        &settings.google_redirect_url,
    ) {
        (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(OAuthClient::new_google(
            client_id.clone(),
            client_secret.clone(),
            redirect_url.clone(),
        )?),
        _ => {
            info!("Google OAuth is not configured, provider sign-in is disabled");
            None
        }
    };

    info!("Web front-end initialized against {}", settings.backend_url);

    let state = AppState {
        settings: Arc::new(settings),
        backend,
        http,
        sessions,
        oauth,
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
    };

    // Start the web server
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Web front-end listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
