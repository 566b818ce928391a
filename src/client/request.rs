use percent_encoding::{percent_encode, NON_ALPHANUMERIC};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::crypto::{self, HashAlgorithm};
use crate::rpc::{CallKind, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::utils::{ClientError, ErrorBody};

/// One outbound call. The message is serialized once at construction and
/// those exact bytes are signed and sent.
#[derive(Debug, Clone)]
pub struct Request {
    kind: CallKind,
    url: Url,
    message: Vec<u8>,
    /// `(timestamp, base64 signature)` once signed.
    auth: Option<(String, String)>,
}

impl Request {
    /// Read call: the message travels percent-encoded in the query.
    pub fn get<T: Serialize + ?Sized>(url: &str, req: &T) -> Result<Self, ClientError> {
        Self::new(CallKind::Read, url, req)
    }

    /// Write call: the message travels verbatim in the body.
    pub fn post<T: Serialize + ?Sized>(url: &str, req: &T) -> Result<Self, ClientError> {
        Self::new(CallKind::Write, url, req)
    }

    fn new<T: Serialize + ?Sized>(kind: CallKind, url: &str, req: &T) -> Result<Self, ClientError> {
        let message = serde_json::to_vec(req).map_err(ClientError::Encode)?;
        let url = Url::parse(url).map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self { kind, url, message, auth: None })
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    /// Canonical message bytes.
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// Attach timestamp and signature headers. Signing again replaces them.
    /// An empty key disables signing and leaves the request untouched.
    pub fn sign(&mut self, alg: HashAlgorithm, key: &str, timestamp: i64) -> &mut Self {
        if key.is_empty() {
            return self;
        }
        let ts = timestamp.to_string();
        let sig = crypto::sign(alg, key.as_bytes(), &ts, self.url.path(), &self.message);
        self.auth = Some((ts, sig.to_base64()));
        self
    }

    pub fn is_signed(&self) -> bool {
        self.auth.is_some()
    }

    /// The URL the call goes to. Read calls replace any existing query with
    /// the encoded message.
    pub fn target(&self) -> Url {
        let mut url = self.url.clone();
        if self.kind == CallKind::Read {
            let query = percent_encode(&self.message, NON_ALPHANUMERIC).to_string();
            url.set_query(Some(&query));
        }
        url
    }

    /// Perform the call and decode the response into `R`.
    pub async fn send<R: DeserializeOwned>(self, client: &Client) -> Result<R, ClientError> {
        let target = self.target();
        debug!(kind = ?self.kind, url = %target, signed = self.is_signed(), "sending request");

        let mut builder = match self.kind {
            CallKind::Read => client.get(target),
            CallKind::Write => client.post(target).body(self.message),
        };
        builder = builder.header(CONTENT_TYPE, "application/json");
        if let Some((ts, sig)) = self.auth {
            builder = builder.header(TIMESTAMP_HEADER, ts).header(SIGNATURE_HEADER, sig);
        }

        let rsp = builder.send().await?;
        let status = rsp.status();
        let body = rsp.bytes().await?;
        decode_response(status, &body)
    }
}

/// Success decodes into `R`; status 500 with the fixed error body is an
/// application error; anything else is an unexpected status.
pub fn decode_response<R: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<R, ClientError> {
    if status.is_success() {
        return serde_json::from_slice(body).map_err(ClientError::Decode);
    }
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        if let Ok(e) = serde_json::from_slice::<ErrorBody>(body) {
            return Err(ClientError::Application(e.error));
        }
    }
    Err(ClientError::UnexpectedStatus {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body).into_owned(),
    })
}
