//! Session model and related functionality

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Federation-supplied profile retained while registration is pending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Claims carried by the signed session token
///
/// The session is self-contained: identity, the current backend token pair,
/// and refresh bookkeeping all travel inside the signature. A new federated
/// identity has no backend account yet, so `sub`, `username` and both
/// tokens stay absent until registration completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Backend subject id; absent while registration is pending
    #[serde(default)]
    pub sub: Option<Uuid>,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// Current backend access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Current backend refresh token; never leaves the signed session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds of the last successful issue or refresh
    pub token_issued_at: i64,

    pub is_new_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_profile: Option<PendingProfile>,

    /// Guards against retrying a failed refresh forever
    #[serde(default)]
    pub refresh_attempted: bool,

    /// Session issue time, unix seconds
    pub iat: i64,
    /// Session expiry, unix seconds
    pub exp: i64,
}

impl SessionClaims {
    /// Whether the claims satisfy the token-presence invariant:
    /// a pending registration carries no tokens, everything else carries
    /// both.
    pub fn is_coherent(&self) -> bool {
        if self.is_new_user {
            self.access_token.is_none() && self.refresh_token.is_none()
        } else {
            self.access_token.is_some() && self.refresh_token.is_some()
        }
    }
}

/// Session projection handed to the browser
///
/// Never carries token material; `has_valid_access` is the only signal the
/// UI gets about the token pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_new_user: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_profile: Option<PendingProfile>,
    pub has_valid_access: bool,
}

impl SessionView {
    /// Project claims into the browser-safe read model.
    pub fn from_claims(claims: &SessionClaims, has_valid_access: bool) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username.clone(),
            email: claims.email.clone(),
            display_name: claims.display_name.clone(),
            avatar_url: claims.avatar_url.clone(),
            is_new_user: claims.is_new_user,
            pending_profile: claims.pending_profile.clone(),
            has_valid_access,
        }
    }
}
