//! Reverse proxy to the trading backend
//!
//! Forwards arbitrary API calls from the browser to the backend, injecting
//! the session's current access token. Bodies pass through untouched in
//! both directions — multipart uploads must never be parsed or rebuilt —
//! and the response status and content headers are mirrored to the caller.

use axum::{
    Json,
    body::Body,
    extract::{Path, Request, State},
    http::{
        HeaderMap, HeaderName, Method, StatusCode,
        header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING},
    },
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use futures::StreamExt;
use serde_json::json;
use tracing::{error, warn};

use common::error::AuthError;

use crate::AppState;
use crate::jwt::SESSION_COOKIE;
use crate::session::{self, SessionUpdate};

/// Collection routes the backend serves only with a trailing slash
const COLLECTION_PREFIXES: &[&str] = &[
    "skills",
    "trade-requests",
    "users",
    "reviews",
    "notifications",
];

/// Inbound headers forwarded to the backend. Everything else — including
/// any caller-supplied authorization — is dropped; the upstream credential
/// always comes from the session.
const FORWARDED_HEADERS: [HeaderName; 4] = [
    CONTENT_TYPE,
    CONTENT_LENGTH,
    CONTENT_ENCODING,
    TRANSFER_ENCODING,
];

/// Apply the backend's trailing-slash convention to a resource path.
///
/// Body-bearing methods and known collection routes need the slash;
/// GET/HEAD requests outside those routes pass through unmodified.
fn normalize_path(method: &Method, path: &str) -> String {
    if path.ends_with('/') {
        return path.to_string();
    }

    let first_segment = path.split('/').next().unwrap_or("");
    let body_bearing = *method != Method::GET && *method != Method::HEAD;

    if body_bearing || COLLECTION_PREFIXES.contains(&first_segment) {
        format!("{}/", path)
    } else {
        path.to_string()
    }
}

/// Keep only the content-related inbound headers.
fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_HEADERS {
        if let Some(value) = headers.get(&name) {
            forwarded.insert(name, value.clone());
        }
    }
    forwarded
}

/// The fixed response for any failure reaching the backend.
fn proxy_failure() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Proxy request failed" })),
    )
        .into_response()
}

/// Mirror the upstream status, content headers, and body stream.
fn mirror_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();

    let mut headers = HeaderMap::new();
    for name in [CONTENT_TYPE, CONTENT_LENGTH] {
        if let Some(value) = upstream.headers().get(&name) {
            headers.insert(name, value.clone());
        }
    }

    let body = Body::from_stream(
        upstream
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other)),
    );

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Forward one API call to the backend.
pub async fn forward(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(path): Path<String>,
    request: Request,
) -> Response {
    let claims = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.decode(cookie.value()));

    let resolved = session::resolve(claims, state.backend.as_ref(), Utc::now()).await;

    // Reflect any session mutation (refresh, invalidation) on this response.
    let jar = match &resolved.update {
        SessionUpdate::Renew(next) => match state.sessions.encode(next.clone()) {
            Ok(token) => jar.add(state.sessions.cookie(token)),
            Err(err) => {
                error!("Failed to re-sign session: {}", err);
                jar
            }
        },
        SessionUpdate::Clear => {
            warn!("Clearing invalid session on proxied request");
            jar.remove(state.sessions.removal_cookie())
        }
        SessionUpdate::Unchanged => jar,
    };

    let method = request.method().clone();
    let query = request
        .uri()
        .query()
        .map(|q| format!("?{}", q))
        .unwrap_or_default();
    let upstream_url = format!(
        "{}/api/{}/{}{}",
        state.settings.backend_url.trim_end_matches('/'),
        state.settings.backend_api_prefix,
        normalize_path(&method, &path),
        query,
    );

    let mut builder = state
        .http
        .request(method.clone(), &upstream_url)
        .headers(forwarded_headers(request.headers()));

    if let Some(access_token) = &resolved.access_token {
        builder = builder.bearer_auth(access_token);
    }

    // Acquire the raw inbound stream once; GET/HEAD carry no body.
    if method != Method::GET && method != Method::HEAD {
        let stream = request.into_body().into_data_stream();
        builder = builder.body(reqwest::Body::wrap_stream(stream));
    }

    match builder.send().await {
        Ok(upstream) => (jar, mirror_response(upstream)).into_response(),
        Err(err) => {
            let err = AuthError::ProxyUnavailable(err.to_string());
            error!("Proxy request to {} failed: {}", upstream_url, err);
            (jar, proxy_failure()).into_response()
        }
    }
}
