use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body message used when a handler fails with an unexpected defect.
pub const DEFECT_MESSAGE: &str = "unknown";

/// Fixed shape of every error body: `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Classification of a call-scoped failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed envelope: bad percent-encoding, unreadable body, bad headers.
    BadRequest,
    /// Timestamp older than the freshness window.
    Expired,
    /// Signature mismatch.
    Unauthorized,
    /// Payload present but not valid for the requested shape.
    Decode,
    /// Handler used the exchange out of order, or the server cannot verify.
    Precondition,
    /// The handler's return value could not be serialized.
    Encode,
    /// Raised explicitly by handler code.
    Application,
}

/// A failed call. Produced only after the failure has been logged; turning it
/// into a response writes the fixed error body with status 500.
#[must_use = "an abort only fails the call when it is returned from the handler"]
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct Abort {
    kind: ErrorKind,
    message: String,
}

impl Abort {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for Abort {
    fn into_response(self) -> Response {
        error_response(self.message)
    }
}

pub(crate) fn error_response(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody { error: message.into() }),
    )
        .into_response()
}

/// Response written when the per-call barrier catches a defect.
pub(crate) fn defect_response() -> Response {
    error_response(DEFECT_MESSAGE)
}

/// Client side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request url: {0}")]
    Build(String),

    #[error("request encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The server answered with the fixed error body.
    #[error("internal server error : {0}")]
    Application(String),

    #[error("unknown error code {status}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Configuration file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
