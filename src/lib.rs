//! Minimal JSON request/response dispatch for HTTP services.
//!
//! - `rpc`: server dispatcher, per-call `Exchange`, freshness and signature checks
//! - `client`: outbound request builder that signs exactly the bytes it sends
//! - `crypto`: the shared `key || timestamp || path || message` digest
//! - `config`, `utils`: configuration, errors, logging

pub mod cli;
pub mod client;
pub mod config;
pub mod crypto;
pub mod rpc;
pub mod utils;

#[cfg(test)]
mod tests;

pub use client::Request;
pub use config::{ApiConfig, ServerConfig};
pub use crypto::HashAlgorithm;
pub use rpc::{Api, CallKind, Exchange, Handler};
pub use utils::{Abort, ClientError, ErrorKind};
