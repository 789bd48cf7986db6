//! Signed session token encoding
//!
//! The session is a self-contained HS256 token carried in an HttpOnly
//! cookie: identity claims plus the current backend token pair, signed with
//! a server-side secret. There is no server-side session table — the
//! signature is the only thing that makes the cookie trustworthy, so a
//! token that fails verification reads as "no session".

use anyhow::Result;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::models::SessionClaims;

/// Name of the cookie carrying the signed session
pub const SESSION_COOKIE: &str = "session";

/// Name of the short-lived cookie protecting the OAuth dance
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Lifetime of the OAuth state cookie in minutes
const OAUTH_STATE_MINUTES: i64 = 10;

/// Claims for the cookie that carries OAuth CSRF state and PKCE verifier
/// between the redirect and the callback
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthStateClaims {
    pub csrf: String,
    pub verifier: String,
    pub iat: i64,
    pub exp: i64,
}

/// Encoder/decoder for the signed session and its cookies
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    session_days: i64,
    cookie_secure: bool,
}

impl SessionCodec {
    /// Create a codec over the server-side signing secret
    pub fn new(secret: &str, session_days: i64, cookie_secure: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            session_days,
            cookie_secure,
        }
    }

    /// Sign claims into a compact session token, stamping a fresh
    /// `iat`/`exp` pair so every encode extends the session lifetime.
    pub fn encode(&self, mut claims: SessionClaims) -> Result<String> {
        let now = Utc::now();
        claims.iat = now.timestamp();
        claims.exp = (now + Duration::days(self.session_days)).timestamp();

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify and decode a session token
    ///
    /// Any failure — bad signature, expired lifetime, garbage — reads as
    /// "no session"; the caller falls back to unauthenticated handling.
    pub fn decode(&self, token: &str) -> Option<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Build the session cookie for a signed token
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, token);
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_path("/");
        cookie.set_secure(self.cookie_secure);
        cookie.set_max_age(time::Duration::days(self.session_days));
        cookie
    }

    /// Build the removal cookie that clears a session
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, "");
        cookie.set_path("/");
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }

    /// Sign the OAuth dance state into a short-lived token
    pub fn encode_oauth_state(&self, csrf: String, verifier: String) -> Result<String> {
        let now = Utc::now();
        let claims = OAuthStateClaims {
            csrf,
            verifier,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(OAUTH_STATE_MINUTES)).timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Verify and decode an OAuth state token
    pub fn decode_oauth_state(&self, token: &str) -> Option<OAuthStateClaims> {
        decode::<OAuthStateClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Build the cookie carrying the OAuth dance state
    pub fn oauth_state_cookie(&self, token: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(OAUTH_STATE_COOKIE, token);
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_path("/");
        cookie.set_secure(self.cookie_secure);
        cookie.set_max_age(time::Duration::minutes(OAUTH_STATE_MINUTES));
        cookie
    }

    /// Build the removal cookie for the OAuth dance state
    pub fn oauth_state_removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(OAUTH_STATE_COOKIE, "");
        cookie.set_path("/");
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }
}
