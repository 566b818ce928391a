use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::crypto::HashAlgorithm;
use crate::utils::{ConfigError, Logger, TracingLogger};

/// Largest write body read into an exchange by default (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Process-wide settings of one `Api`. Read-only once the server starts.
#[derive(Clone)]
pub struct ApiConfig {
    /// Digest used to verify signatures; `None` disables signing.
    pub hash: Option<HashAlgorithm>,
    pub logger: Arc<dyn Logger>,
    pub body_limit: usize,
}

impl ApiConfig {
    pub fn new(hash: Option<HashAlgorithm>) -> Self {
        Self { hash, logger: Arc::new(TracingLogger), body_limit: DEFAULT_BODY_LIMIT }
    }

    pub fn with_logger(mut self, logger: impl Logger) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Settings of the `jsonapi serve` demo service, loaded from TOML.
///
/// ```toml
/// bind = "127.0.0.1:8080"
/// hash = "sha256"
/// key = "mykey"
/// max_age = 30
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub hash: Option<HashAlgorithm>,
    /// Shared secret for signed routes; empty disables the signature check.
    pub key: String,
    /// Freshness window in seconds; 0 disables the timestamp check.
    pub max_age: i64,
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            hash: Some(HashAlgorithm::Sha256),
            key: String::new(),
            max_age: 30,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file. Missing fields keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(data: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(self.hash).with_body_limit(self.body_limit)
    }
}
