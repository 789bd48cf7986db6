//! Web front-end routes
//!
//! The credential and federation entry points into the session store, the
//! UI-facing session read model, and the proxy mount. Handlers never hand
//! token material to the browser — the signed cookie is the only carrier.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use common::error::AuthError;

use crate::{
    AppState,
    backend::FederatedProfile,
    error::{WebError, WebResult},
    jwt::{OAUTH_STATE_COOKIE, SESSION_COOKIE},
    models::SessionView,
    proxy, session,
    session::SessionUpdate,
    validation,
};

/// Request for a password login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Request for a federated login with a provider-supplied profile
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Query parameters of the OAuth callback
#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: String,
    pub state: String,
}

/// Create the router for the web front-end service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/federated", post(federated_login))
        .route("/auth/session", get(read_session))
        .route("/auth/logout", post(logout))
        .route("/auth/oauth/google", get(oauth_start))
        .route("/auth/oauth/google/callback", get(oauth_callback))
        .route("/api/*path", any(proxy::forward))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "web-frontend"
    }))
}

/// Password login endpoint
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> WebResult<impl IntoResponse> {
    info!("Login attempt for {}", payload.identifier);

    validation::validate_identifier(&payload.identifier).map_err(WebError::BadRequest)?;
    validation::validate_password(&payload.password).map_err(WebError::BadRequest)?;

    if !state.rate_limiter.check(&payload.identifier).await {
        warn!("Login rate limit hit for {}", payload.identifier);
        return Err(WebError::TooManyAttempts);
    }

    let credentials = state
        .backend
        .password_login(&payload.identifier, &payload.password)
        .await?;
    state.rate_limiter.reset(&payload.identifier).await;

    let claims = session::issue_from_credentials(credentials, Utc::now());
    let view = SessionView::from_claims(&claims, true);
    let token = state.sessions.encode(claims).map_err(|err| {
        error!("Failed to sign session: {}", err);
        WebError::InternalServerError
    })?;

    info!("Session established for {}", payload.identifier);
    Ok((jar.add(state.sessions.cookie(token)), Json(view)))
}

/// Federated login endpoint, taking a provider-supplied profile
pub async fn federated_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<FederatedRequest>,
) -> WebResult<impl IntoResponse> {
    info!("Federated login attempt for {}", payload.email);

    let profile = FederatedProfile {
        email: payload.email,
        name: payload.name,
        avatar_url: payload.avatar_url,
    };

    let response = state.backend.federated_login(&profile).await?;
    let claims = session::issue_from_federation(response, Utc::now())?;

    if claims.is_new_user {
        info!("Federated identity {} has no account yet", claims.email);
    } else {
        info!("Session established for {}", claims.email);
    }

    let view = SessionView::from_claims(&claims, claims.access_token.is_some());
    let token = state.sessions.encode(claims).map_err(|err| {
        error!("Failed to sign session: {}", err);
        WebError::InternalServerError
    })?;

    Ok((jar.add(state.sessions.cookie(token)), Json(view)))
}

/// Session read endpoint: re-validates, refreshes when due, and extends
/// the session lifetime
pub async fn read_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> WebResult<Response> {
    let claims = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.decode(cookie.value()));

    if claims.is_none() {
        return Err(WebError::Unauthorized);
    }

    let resolved = session::resolve(claims, state.backend.as_ref(), Utc::now()).await;

    match resolved.update {
        SessionUpdate::Renew(next) => {
            let view = SessionView::from_claims(&next, resolved.access_token.is_some());
            let token = state.sessions.encode(next).map_err(|err| {
                error!("Failed to re-sign session: {}", err);
                WebError::InternalServerError
            })?;

            Ok((jar.add(state.sessions.cookie(token)), Json(view)).into_response())
        }
        SessionUpdate::Clear | SessionUpdate::Unchanged => {
            let jar = jar.remove(state.sessions.removal_cookie());
            Ok((jar, WebError::Auth(AuthError::SessionInvalid)).into_response())
        }
    }
}

/// Logout endpoint
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    info!("Logout");
    let jar = jar.remove(state.sessions.removal_cookie());
    (jar, Json(serde_json::json!({ "message": "Logged out" })))
}

/// Start the Google OAuth dance
pub async fn oauth_start(
    State(state): State<AppState>,
    jar: CookieJar,
) -> WebResult<Response> {
    let Some(oauth) = &state.oauth else {
        return Err(WebError::OAuthNotConfigured);
    };

    let (auth_url, csrf, verifier) = oauth.authorization_url();
    let token = state
        .sessions
        .encode_oauth_state(csrf.secret().clone(), verifier.secret().clone())
        .map_err(|err| {
            error!("Failed to sign OAuth state: {}", err);
            WebError::InternalServerError
        })?;

    let jar = jar.add(state.sessions.oauth_state_cookie(token));
    Ok((jar, Redirect::temporary(&auth_url)).into_response())
}

/// Finish the Google OAuth dance and funnel into the federated issue path
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> WebResult<Response> {
    let Some(oauth) = &state.oauth else {
        return Err(WebError::OAuthNotConfigured);
    };

    let stored = jar
        .get(OAUTH_STATE_COOKIE)
        .and_then(|cookie| state.sessions.decode_oauth_state(cookie.value()))
        .ok_or(WebError::Unauthorized)?;

    if stored.csrf != query.state {
        warn!("OAuth state mismatch on callback");
        return Err(WebError::Unauthorized);
    }

    let profile = oauth
        .fetch_profile(query.code, stored.verifier)
        .await
        .map_err(|err| {
            error!("OAuth code exchange failed: {}", err);
            WebError::Auth(AuthError::FederationFailed)
        })?;

    let response = state.backend.federated_login(&profile).await?;
    let claims = session::issue_from_federation(response, Utc::now())?;
    let token = state.sessions.encode(claims).map_err(|err| {
        error!("Failed to sign session: {}", err);
        WebError::InternalServerError
    })?;

    let jar = jar
        .remove(state.sessions.oauth_state_removal_cookie())
        .add(state.sessions.cookie(token));

    Ok((jar, Redirect::temporary("/")).into_response())
}
