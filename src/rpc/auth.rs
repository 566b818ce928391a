use axum::http::HeaderMap;
use std::num::ParseIntError;
use tracing::debug;

use crate::crypto::{self, HashAlgorithm, Signature};
use crate::utils::ErrorKind;

/// Header carrying the request timestamp (decimal unix seconds).
pub const TIMESTAMP_HEADER: &str = "t";
/// Header carrying the base64 request signature.
pub const SIGNATURE_HEADER: &str = "s";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP header 't' not a number")]
    BadTimestamp(#[source] ParseIntError),

    #[error("Request expired")]
    Expired,

    #[error("payload not extracted before authenticate")]
    PayloadNotRead,

    #[error("request signing is not configured on this server")]
    SigningDisabled,

    #[error("HTTP header 's' not base64 string")]
    BadSignature(#[source] base64::DecodeError),

    #[error("Signature validate failed")]
    Mismatch,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::BadTimestamp(_) | AuthError::BadSignature(_) => ErrorKind::BadRequest,
            AuthError::Expired => ErrorKind::Expired,
            AuthError::PayloadNotRead | AuthError::SigningDisabled => ErrorKind::Precondition,
            AuthError::Mismatch => ErrorKind::Unauthorized,
        }
    }
}

/// What a verifier needs to know about one request.
#[derive(Debug, Clone, Copy)]
pub struct AuthInput<'a> {
    pub headers: &'a HeaderMap,
    pub path: &'a str,
    /// Canonical message bytes, `None` if they were never read.
    pub payload: Option<&'a [u8]>,
}

/// Missing or non-text headers read as empty.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

/// Freshness first, then authenticity.
///
/// Freshness runs only for `max_age > 0`; the request is expired when
/// `timestamp + max_age < now`. Authenticity runs only for a non-empty `key`.
pub fn check(
    hash: Option<HashAlgorithm>,
    input: AuthInput<'_>,
    key: &str,
    max_age: i64,
    now: i64,
) -> Result<(), AuthError> {
    let time_str = header_str(input.headers, TIMESTAMP_HEADER);

    if max_age > 0 {
        let ts: i64 = time_str.parse().map_err(AuthError::BadTimestamp)?;
        if ts.saturating_add(max_age) < now {
            debug!(ts, max_age, now, "request timestamp outside freshness window");
            return Err(AuthError::Expired);
        }
    }

    if key.is_empty() {
        return Ok(());
    }

    let message = input.payload.ok_or(AuthError::PayloadNotRead)?;
    let alg = hash.ok_or(AuthError::SigningDisabled)?;
    let sig = Signature::from_base64(header_str(input.headers, SIGNATURE_HEADER))
        .map_err(AuthError::BadSignature)?;

    if !crypto::verify(alg, &sig, key.as_bytes(), time_str, input.path, message) {
        return Err(AuthError::Mismatch);
    }
    Ok(())
}
