//! Per-call server context.
//!
//! An `Exchange` is created when a call enters the dispatcher and dropped when
//! it leaves. It owns the canonical message bytes (read at most once) and the
//! request metadata, and it is the only way a handler can fail a call.

use axum::body::Body;
use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::rpc::auth::{self, AuthInput};
use crate::utils::{now, Abort, CallInfo, ErrorKind};

/// Which envelope carries the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Message is the percent-decoded query string.
    Read,
    /// Message is the request body, verbatim.
    Write,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid percent escape at offset {offset}")]
pub struct InvalidEscape {
    pub offset: usize,
}

/// Strict query unescaping: every `%` must start a two-digit hex escape and
/// `+` decodes to a space.
pub fn query_unescape(raw: &str) -> Result<Vec<u8>, InvalidEscape> {
    let bytes = raw.as_bytes();
    for (offset, b) in bytes.iter().enumerate() {
        if *b != b'%' {
            continue;
        }
        let valid = bytes
            .get(offset + 1..offset + 3)
            .map(|hex| hex.iter().all(u8::is_ascii_hexdigit))
            .unwrap_or(false);
        if !valid {
            return Err(InvalidEscape { offset });
        }
    }
    let spaced = raw.replace('+', " ");
    Ok(percent_decode_str(&spaced).collect())
}

pub struct Exchange {
    config: Arc<ApiConfig>,
    call: CallInfo,
    kind: CallKind,
    parts: Parts,
    body: Option<Body>,
    payload: Option<Result<Bytes, Abort>>,
}

impl Exchange {
    pub(crate) fn new(config: Arc<ApiConfig>, kind: CallKind, req: Request) -> Self {
        let (parts, body) = req.into_parts();
        let target = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        let call = CallInfo { method: parts.method.clone(), target };
        Self { config, call, kind, parts, body: Some(body), payload: None }
    }

    pub fn call(&self) -> &CallInfo {
        &self.call
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Canonical message bytes, if they have been extracted.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_ref().and_then(|p| p.as_deref().ok())
    }

    /// Read the canonical message bytes from the envelope. Later calls return
    /// the outcome of the first one; a failed read stays failed.
    pub async fn extract_payload(&mut self) -> Result<&[u8], Abort> {
        let payload = match self.payload.take() {
            Some(p) => p,
            None => self.read_payload().await,
        };
        self.payload.insert(payload).as_deref().map_err(Abort::clone)
    }

    async fn read_payload(&mut self) -> Result<Bytes, Abort> {
        match self.kind {
            CallKind::Read => {
                let raw = self.parts.uri.query().unwrap_or("");
                query_unescape(raw)
                    .map(Bytes::from)
                    .map_err(|e| self.fail_on(ErrorKind::BadRequest, "Invalid query string", &e))
            }
            CallKind::Write => {
                let body = self.body.take().unwrap_or_default();
                axum::body::to_bytes(body, self.config.body_limit)
                    .await
                    .map_err(|e| self.fail_on(ErrorKind::BadRequest, "Bad request", &e))
            }
        }
    }

    /// Decode the message into `out`. An empty message leaves `out` untouched.
    pub async fn bind_into<T: DeserializeOwned>(&mut self, out: &mut T) -> Result<(), Abort> {
        self.extract_payload().await?;
        let message = self.payload().unwrap_or_default();
        if message.is_empty() {
            return Ok(());
        }
        *out = serde_json::from_slice(message).map_err(|e| {
            let reason = format!("JSON unmarshal failed, msg: {}", String::from_utf8_lossy(message));
            self.fail_on(ErrorKind::Decode, reason, &e)
        })?;
        Ok(())
    }

    /// Decode the message, or `T::default()` when there is none.
    pub async fn bind<T: DeserializeOwned + Default>(&mut self) -> Result<T, Abort> {
        let mut out = T::default();
        self.bind_into(&mut out).await?;
        Ok(out)
    }

    /// Check freshness (when `max_age > 0`) and then the signature (when `key`
    /// is non-empty) against the current time.
    pub fn authenticate(&self, key: &str, max_age: i64) -> Result<(), Abort> {
        self.authenticate_at(key, max_age, now())
    }

    /// Same as [`Exchange::authenticate`] with an explicit clock reading.
    pub fn authenticate_at(&self, key: &str, max_age: i64, now: i64) -> Result<(), Abort> {
        if let Some(Err(abort)) = &self.payload {
            return Err(abort.clone());
        }
        let input = AuthInput {
            headers: &self.parts.headers,
            path: self.parts.uri.path(),
            payload: self.payload(),
        };
        auth::check(self.config.hash, input, key, max_age, now).map_err(|e| {
            let cause = e.source();
            self.fail(e.kind(), e.to_string(), cause)
        })
    }

    /// Fail the call with an application message. Return the result from the
    /// handler to stop it.
    pub fn abort(&self, reason: impl Into<String>, cause: Option<&(dyn Error + 'static)>) -> Abort {
        self.fail(ErrorKind::Application, reason, cause)
    }

    fn fail(&self, kind: ErrorKind, reason: impl Into<String>, cause: Option<&(dyn Error + 'static)>) -> Abort {
        abort_call(&self.config, &self.call, kind, reason, cause)
    }

    fn fail_on(&self, kind: ErrorKind, reason: impl Into<String>, cause: &(dyn Error + 'static)) -> Abort {
        self.fail(kind, reason, Some(cause))
    }
}

/// Log an aborted call and build its error value.
pub(crate) fn abort_call(
    config: &ApiConfig,
    call: &CallInfo,
    kind: ErrorKind,
    reason: impl Into<String>,
    cause: Option<&(dyn Error + 'static)>,
) -> Abort {
    let reason = reason.into();
    config.logger.fatal(call, &reason, cause);
    Abort::new(kind, reason)
}
