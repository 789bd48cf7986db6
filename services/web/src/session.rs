//! Session state machine
//!
//! The session lifecycle is driven by a pure transition layer: handlers
//! issue claims from backend responses, every incoming request evaluates
//! the claims, and a due refresh is applied as an explicit event. The only
//! side effect — the backend refresh call — is isolated in [`resolve`], so
//! the transitions unit-test without a live backend.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use common::error::AuthError;
use common::token;

use crate::backend::{BackendClient, CredentialResponse, FederationResponse};
use crate::models::{PendingProfile, SessionClaims};

/// How close to expiry the access token may get before a refresh is due.
/// Fixed rather than configurable: early enough that the proxy never
/// forwards an expired token, late enough to avoid refresh storms.
pub const REFRESH_LOOKAHEAD_MINUTES: i64 = 10;

/// Outcome of evaluating a session on use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Federated identity awaiting registration; no tokens to check
    PendingRegistration,
    /// Access token is serviceable as-is
    Fresh,
    /// Access token is close to expiry and must be refreshed first
    RefreshDue,
    /// Token material is missing; the session must be discarded
    Invalid,
}

/// Result of the backend refresh call, fed to the pure transition
#[derive(Debug)]
pub enum RefreshEvent {
    Succeeded {
        access_token: String,
        refresh_token: Option<String>,
    },
    /// The backend answered and refused the refresh token
    Rejected,
    /// The backend could not be reached or answered with garbage
    Unreachable,
}

/// Next session state plus the access token the current request may use
#[derive(Debug)]
pub struct Transition {
    /// `None` clears the session and forces re-authentication
    pub session: Option<SessionClaims>,
    /// Token to attach upstream for this request, if any
    pub access_token: Option<String>,
}

/// What the caller must do with the session cookie after resolution
#[derive(Debug)]
pub enum SessionUpdate {
    /// No cookie accompanied the request; nothing to write back
    Unchanged,
    /// Re-sign and extend the session with these claims
    Renew(SessionClaims),
    /// Remove the session cookie; the caller must re-authenticate
    Clear,
}

/// Session resolution for one request
#[derive(Debug)]
pub struct Resolved {
    /// Access token to present to the backend, if the session yields one
    pub access_token: Option<String>,
    pub update: SessionUpdate,
}

/// Build Active-session claims from a password login response.
pub fn issue_from_credentials(response: CredentialResponse, now: DateTime<Utc>) -> SessionClaims {
    SessionClaims {
        sub: Some(response.subject_id),
        username: Some(response.username),
        email: response.email,
        display_name: response.display_name,
        avatar_url: response.avatar_url,
        access_token: Some(response.access_token),
        refresh_token: Some(response.refresh_token),
        token_issued_at: now.timestamp(),
        is_new_user: false,
        pending_profile: None,
        refresh_attempted: false,
        iat: 0,
        exp: 0,
    }
}

/// Build session claims from a federated login response.
///
/// An existing account yields Active claims; a new account yields a
/// pending-registration session that retains the provider profile and no
/// tokens. A response claiming an existing account without token material
/// is malformed.
pub fn issue_from_federation(
    response: FederationResponse,
    now: DateTime<Utc>,
) -> Result<SessionClaims, AuthError> {
    if response.is_new_account {
        return Ok(SessionClaims {
            sub: None,
            username: None,
            email: response.email.clone(),
            display_name: response.name.clone(),
            avatar_url: response.avatar_url.clone(),
            access_token: None,
            refresh_token: None,
            token_issued_at: now.timestamp(),
            is_new_user: true,
            pending_profile: Some(PendingProfile {
                email: response.email,
                name: response.name,
                avatar_url: response.avatar_url,
            }),
            refresh_attempted: false,
            iat: 0,
            exp: 0,
        });
    }

    let (Some(access_token), Some(refresh_token), Some(subject_id)) = (
        response.access_token,
        response.refresh_token,
        response.subject_id,
    ) else {
        return Err(AuthError::MalformedUpstreamResponse(
            "federated login reported an existing account without tokens".to_string(),
        ));
    };

    Ok(SessionClaims {
        sub: Some(subject_id),
        username: response.username,
        email: response.email,
        display_name: response.name,
        avatar_url: response.avatar_url,
        access_token: Some(access_token),
        refresh_token: Some(refresh_token),
        token_issued_at: now.timestamp(),
        is_new_user: false,
        pending_profile: None,
        refresh_attempted: false,
        iat: 0,
        exp: 0,
    })
}

/// Evaluate a session at the moment of use.
pub fn evaluate(claims: &SessionClaims, now: DateTime<Utc>) -> Evaluation {
    if claims.is_new_user {
        return Evaluation::PendingRegistration;
    }

    let access_token = match (&claims.access_token, &claims.refresh_token) {
        (Some(access_token), Some(_)) => access_token,
        _ => return Evaluation::Invalid,
    };

    match token::peek_expiry(access_token) {
        Some(expiry) if expiry - now < Duration::minutes(REFRESH_LOOKAHEAD_MINUTES) => {
            Evaluation::RefreshDue
        }
        // No readable expiry: the hint is advisory, the backend decides.
        _ => Evaluation::Fresh,
    }
}

/// Apply a refresh result to the session.
pub fn apply_refresh(
    mut claims: SessionClaims,
    event: RefreshEvent,
    now: DateTime<Utc>,
) -> Transition {
    match event {
        RefreshEvent::Succeeded {
            access_token,
            refresh_token,
        } => {
            claims.access_token = Some(access_token.clone());
            if let Some(rotated) = refresh_token {
                claims.refresh_token = Some(rotated);
            }
            claims.token_issued_at = now.timestamp();
            claims.refresh_attempted = false;

            Transition {
                session: Some(claims),
                access_token: Some(access_token),
            }
        }
        // An outright rejection cannot heal; retrying only burns a call.
        RefreshEvent::Rejected => Transition {
            session: None,
            access_token: None,
        },
        RefreshEvent::Unreachable if !claims.refresh_attempted => {
            // Serve the still-possibly-valid access token once and try
            // again on the next use.
            claims.refresh_attempted = true;
            let access_token = claims.access_token.clone();

            Transition {
                session: Some(claims),
                access_token,
            }
        }
        RefreshEvent::Unreachable => Transition {
            session: None,
            access_token: None,
        },
    }
}

/// Resolve the session for one request: evaluate, refresh when due, and
/// report the cookie follow-up.
pub async fn resolve(
    claims: Option<SessionClaims>,
    backend: &dyn BackendClient,
    now: DateTime<Utc>,
) -> Resolved {
    let Some(claims) = claims else {
        return Resolved {
            access_token: None,
            update: SessionUpdate::Unchanged,
        };
    };

    match evaluate(&claims, now) {
        Evaluation::PendingRegistration => Resolved {
            access_token: None,
            update: SessionUpdate::Renew(claims),
        },
        Evaluation::Fresh => Resolved {
            access_token: claims.access_token.clone(),
            update: SessionUpdate::Renew(claims),
        },
        Evaluation::Invalid => {
            warn!("Session is missing token material, forcing sign-in");
            Resolved {
                access_token: None,
                update: SessionUpdate::Clear,
            }
        }
        Evaluation::RefreshDue => {
            let Some(refresh_token) = claims.refresh_token.clone() else {
                return Resolved {
                    access_token: None,
                    update: SessionUpdate::Clear,
                };
            };

            let event = match backend.refresh(&refresh_token).await {
                Ok(response) => {
                    info!("Access token refreshed");
                    RefreshEvent::Succeeded {
                        access_token: response.access_token,
                        refresh_token: response.refresh_token,
                    }
                }
                Err(AuthError::RefreshFailed) => {
                    warn!("Backend rejected the refresh token");
                    RefreshEvent::Rejected
                }
                Err(err) => {
                    warn!("Token refresh did not complete: {}", err);
                    RefreshEvent::Unreachable
                }
            };

            let transition = apply_refresh(claims, event, now);
            match transition.session {
                Some(next) => Resolved {
                    access_token: transition.access_token,
                    update: SessionUpdate::Renew(next),
                },
                None => Resolved {
                    access_token: None,
                    update: SessionUpdate::Clear,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FederatedProfile, RefreshResponse};
    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    /// Compact bearer token whose payload expires at the given instant.
    fn bearer_expiring_at(expiry: DateTime<Utc>) -> String {
        let payload = serde_json::json!({ "exp": expiry.timestamp() }).to_string();
        format!("header.{}.signature", URL_SAFE_NO_PAD.encode(payload))
    }

    fn active_claims(access_token: String) -> SessionClaims {
        SessionClaims {
            sub: Some(Uuid::new_v4()),
            username: Some("star1".to_string()),
            email: "star1@example.com".to_string(),
            display_name: None,
            avatar_url: None,
            access_token: Some(access_token),
            refresh_token: Some("tok-refresh".to_string()),
            token_issued_at: Utc::now().timestamp(),
            is_new_user: false,
            pending_profile: None,
            refresh_attempted: false,
            iat: 0,
            exp: 0,
        }
    }

    fn credential_response() -> CredentialResponse {
        serde_json::from_value(serde_json::json!({
            "accessToken": "tok-access",
            "refreshToken": "tok-refresh",
            "subjectId": Uuid::new_v4(),
            "username": "star1",
            "email": "star1@example.com",
            "displayName": "Star One"
        }))
        .expect("fixture should decode")
    }

    /// Scripted backend double counting refresh calls.
    struct ScriptedBackend {
        refresh_results: Mutex<Vec<Result<RefreshResponse, AuthError>>>,
        refresh_calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(results: Vec<Result<RefreshResponse, AuthError>>) -> Self {
            Self {
                refresh_results: Mutex::new(results),
                refresh_calls: AtomicU32::new(0),
            }
        }

        fn refresh_calls(&self) -> u32 {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackendClient for ScriptedBackend {
        async fn password_login(
            &self,
            _identifier: &str,
            _password: &str,
        ) -> Result<CredentialResponse, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn federated_login(
            &self,
            _profile: &FederatedProfile,
        ) -> Result<FederationResponse, AuthError> {
            Err(AuthError::FederationFailed)
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshResponse, AuthError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_results
                .lock()
                .expect("results lock")
                .pop()
                .unwrap_or(Err(AuthError::ProxyUnavailable("script exhausted".to_string())))
        }
    }

    #[test]
    fn password_issue_yields_a_provisioned_session() {
        let claims = issue_from_credentials(credential_response(), Utc::now());

        assert!(!claims.is_new_user);
        assert_eq!(claims.access_token.as_deref(), Some("tok-access"));
        assert_eq!(claims.refresh_token.as_deref(), Some("tok-refresh"));
        assert!(claims.is_coherent());
    }

    #[test]
    fn federated_issue_for_a_new_account_keeps_the_profile_and_no_tokens() {
        let response: FederationResponse = serde_json::from_value(serde_json::json!({
            "isNewAccount": true,
            "email": "new@example.com",
            "name": "New Person",
            "avatarUrl": "https://img.example.com/p.png"
        }))
        .expect("fixture should decode");

        let claims = issue_from_federation(response, Utc::now()).expect("issue should succeed");

        assert!(claims.is_new_user);
        assert_eq!(claims.access_token, None);
        assert_eq!(claims.refresh_token, None);
        let profile = claims.pending_profile.expect("profile should be retained");
        assert_eq!(profile.email, "new@example.com");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img.example.com/p.png"));
    }

    #[test]
    fn federated_issue_for_an_existing_account_carries_both_tokens() {
        let response: FederationResponse = serde_json::from_value(serde_json::json!({
            "isNewAccount": false,
            "email": "old@example.com",
            "name": "Old Hand",
            "accessToken": "tok-access",
            "refreshToken": "tok-refresh",
            "subjectId": Uuid::new_v4(),
            "username": "oldhand"
        }))
        .expect("fixture should decode");

        let claims = issue_from_federation(response, Utc::now()).expect("issue should succeed");

        assert!(!claims.is_new_user);
        assert!(claims.is_coherent());
        assert_eq!(claims.pending_profile, None);
    }

    #[test]
    fn federated_issue_rejects_an_existing_account_without_tokens() {
        let response: FederationResponse = serde_json::from_value(serde_json::json!({
            "isNewAccount": false,
            "email": "old@example.com"
        }))
        .expect("fixture should decode");

        let result = issue_from_federation(response, Utc::now());
        assert!(matches!(result, Err(AuthError::MalformedUpstreamResponse(_))));
    }

    #[test]
    fn evaluation_skips_the_refresh_check_for_pending_registrations() {
        let mut claims = active_claims(bearer_expiring_at(Utc::now()));
        claims.is_new_user = true;
        claims.access_token = None;
        claims.refresh_token = None;

        assert_eq!(evaluate(&claims, Utc::now()), Evaluation::PendingRegistration);
    }

    #[test]
    fn evaluation_invalidates_a_session_missing_a_token() {
        let mut claims = active_claims(bearer_expiring_at(Utc::now() + Duration::hours(1)));
        claims.refresh_token = None;

        assert_eq!(evaluate(&claims, Utc::now()), Evaluation::Invalid);
    }

    #[test]
    fn expiry_in_nine_minutes_is_refresh_due() {
        let now = Utc::now();
        let claims = active_claims(bearer_expiring_at(now + Duration::minutes(9)));

        assert_eq!(evaluate(&claims, now), Evaluation::RefreshDue);
    }

    #[test]
    fn expiry_in_eleven_minutes_is_fresh() {
        let now = Utc::now();
        let claims = active_claims(bearer_expiring_at(now + Duration::minutes(11)));

        assert_eq!(evaluate(&claims, now), Evaluation::Fresh);
    }

    #[test]
    fn unreadable_expiry_is_served_as_is() {
        let claims = active_claims("opaque-token-without-structure".to_string());

        assert_eq!(evaluate(&claims, Utc::now()), Evaluation::Fresh);
    }

    #[test]
    fn successful_refresh_updates_tokens_and_clears_the_retry_guard() {
        let now = Utc::now();
        let mut claims = active_claims(bearer_expiring_at(now + Duration::minutes(5)));
        claims.refresh_attempted = true;

        let transition = apply_refresh(
            claims,
            RefreshEvent::Succeeded {
                access_token: "tok-access-2".to_string(),
                refresh_token: Some("tok-refresh-2".to_string()),
            },
            now,
        );

        let next = transition.session.expect("session should survive");
        assert_eq!(next.access_token.as_deref(), Some("tok-access-2"));
        assert_eq!(next.refresh_token.as_deref(), Some("tok-refresh-2"));
        assert_eq!(next.token_issued_at, now.timestamp());
        assert!(!next.refresh_attempted);
        assert_eq!(transition.access_token.as_deref(), Some("tok-access-2"));
    }

    #[test]
    fn refresh_without_rotation_keeps_the_old_refresh_token() {
        let now = Utc::now();
        let claims = active_claims(bearer_expiring_at(now + Duration::minutes(5)));

        let transition = apply_refresh(
            claims,
            RefreshEvent::Succeeded {
                access_token: "tok-access-2".to_string(),
                refresh_token: None,
            },
            now,
        );

        let next = transition.session.expect("session should survive");
        assert_eq!(next.refresh_token.as_deref(), Some("tok-refresh"));
    }

    #[test]
    fn first_unreachable_refresh_serves_the_old_token_once() {
        let now = Utc::now();
        let old_access = bearer_expiring_at(now + Duration::minutes(5));
        let claims = active_claims(old_access.clone());

        let transition = apply_refresh(claims, RefreshEvent::Unreachable, now);

        let next = transition.session.expect("session should survive");
        assert!(next.refresh_attempted);
        assert_eq!(next.access_token.as_deref(), Some(old_access.as_str()));
        assert_eq!(transition.access_token.as_deref(), Some(old_access.as_str()));
    }

    #[test]
    fn second_unreachable_refresh_clears_the_session() {
        let now = Utc::now();
        let mut claims = active_claims(bearer_expiring_at(now + Duration::minutes(5)));
        claims.refresh_attempted = true;

        let transition = apply_refresh(claims, RefreshEvent::Unreachable, now);

        assert!(transition.session.is_none());
        assert!(transition.access_token.is_none());
    }

    #[test]
    fn rejected_refresh_clears_the_session_immediately() {
        let now = Utc::now();
        let claims = active_claims(bearer_expiring_at(now + Duration::minutes(5)));

        let transition = apply_refresh(claims, RefreshEvent::Rejected, now);

        assert!(transition.session.is_none());
        assert!(transition.access_token.is_none());
    }

    #[tokio::test]
    async fn resolve_refreshes_exactly_once_when_due() {
        let now = Utc::now();
        let claims = active_claims(bearer_expiring_at(now + Duration::minutes(9)));
        let backend = ScriptedBackend::new(vec![Ok(RefreshResponse {
            access_token: "tok-access-2".to_string(),
            refresh_token: None,
        })]);

        let resolved = resolve(Some(claims), &backend, now).await;

        assert_eq!(backend.refresh_calls(), 1);
        assert_eq!(resolved.access_token.as_deref(), Some("tok-access-2"));
        assert!(matches!(resolved.update, SessionUpdate::Renew(_)));
    }

    #[tokio::test]
    async fn resolve_does_not_refresh_a_fresh_token() {
        let now = Utc::now();
        let access = bearer_expiring_at(now + Duration::minutes(11));
        let claims = active_claims(access.clone());
        let backend = ScriptedBackend::new(vec![]);

        let resolved = resolve(Some(claims), &backend, now).await;

        assert_eq!(backend.refresh_calls(), 0);
        assert_eq!(resolved.access_token.as_deref(), Some(access.as_str()));
    }

    #[tokio::test]
    async fn two_consecutive_failed_refreshes_invalidate_the_session() {
        let now = Utc::now();
        let claims = active_claims(bearer_expiring_at(now + Duration::minutes(9)));
        let backend = ScriptedBackend::new(vec![
            Err(AuthError::ProxyUnavailable("down".to_string())),
            Err(AuthError::ProxyUnavailable("down".to_string())),
        ]);

        let first = resolve(Some(claims), &backend, now).await;
        let SessionUpdate::Renew(survivor) = first.update else {
            panic!("first failure should keep the session for one more try");
        };
        assert!(survivor.refresh_attempted);
        assert!(first.access_token.is_some());

        let second = resolve(Some(survivor), &backend, now).await;
        assert!(matches!(second.update, SessionUpdate::Clear));
        assert!(second.access_token.is_none());
        assert_eq!(backend.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn rejected_refresh_invalidates_without_a_second_attempt() {
        let now = Utc::now();
        let claims = active_claims(bearer_expiring_at(now + Duration::minutes(9)));
        let backend = ScriptedBackend::new(vec![Err(AuthError::RefreshFailed)]);

        let resolved = resolve(Some(claims), &backend, now).await;

        assert!(matches!(resolved.update, SessionUpdate::Clear));
        assert!(resolved.access_token.is_none());
    }

    #[tokio::test]
    async fn resolve_without_a_session_is_anonymous() {
        let backend = ScriptedBackend::new(vec![]);
        let resolved = resolve(None, &backend, Utc::now()).await;

        assert!(resolved.access_token.is_none());
        assert!(matches!(resolved.update, SessionUpdate::Unchanged));
        assert_eq!(backend.refresh_calls(), 0);
    }
}
