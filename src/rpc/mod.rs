//! Server side of the JSON API.
//!
//! - `Api`: route table and per-call dispatch with a panic barrier
//! - `Exchange`: per-call context (payload, bind, authenticate, abort)
//! - `auth`: freshness and signature checks shared by the exchange
//!
//! Reads (GET) carry the message percent-encoded in the query, writes (POST)
//! carry it verbatim in the body.

pub mod auth;
pub mod exchange;
pub mod handlers;
pub mod server;

pub use auth::{AuthError, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use exchange::{CallKind, Exchange};
pub use handlers::Handler;
pub use server::Api;
