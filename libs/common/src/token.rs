//! Bearer token inspection
//!
//! Decodes the expiry of an opaque bearer token without validating its
//! signature. The backend that issued the token stays authoritative for
//! trust on every call; the decoded expiry is only a hint used to refresh
//! tokens proactively.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

/// Extract the `exp` claim of a compact three-part bearer token.
///
/// Returns `None` when the token is not in compact form, the payload is not
/// base64url-encoded JSON, or the `exp` claim is absent. Never panics and
/// never errors on any input.
pub fn peek_expiry(token: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    let claims: JsonValue = serde_json::from_slice(&payload).ok()?;
    let exp = claims.get("exp")?.as_i64()?;

    DateTime::from_timestamp(exp, 0)
}
