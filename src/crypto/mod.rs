//! Crypto module: request digests and signatures.
//!
//! - Hash: selectable digest function (SHA-256, SHA-512, BLAKE3)
//! - Sign: `key || timestamp || path || message` digests and constant-time verification

pub mod hash;
pub mod sign;

pub use hash::{HashAlgorithm, UnknownHashAlgorithm};
pub use sign::{sign, verify, Signature};
