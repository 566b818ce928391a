use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use crate::crypto::HashAlgorithm;

/// Raw digest bytes of a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Header form: base64, standard alphabet, padded.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(s).map(Signature)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Digest over `key || timestamp || path || message`.
///
/// Pure and deterministic. Callers decide whether signing is enabled; an empty
/// key still yields a digest here.
pub fn sign(alg: HashAlgorithm, key: &[u8], timestamp: &str, path: &str, message: &[u8]) -> Signature {
    Signature(alg.digest_parts(&[key, timestamp.as_bytes(), path.as_bytes(), message]))
}

/// Recompute the digest and compare it against `sig` in constant time.
pub fn verify(
    alg: HashAlgorithm,
    sig: &Signature,
    key: &[u8],
    timestamp: &str,
    path: &str,
    message: &[u8],
) -> bool {
    let expected = sign(alg, key, timestamp, path, message);
    // length mismatch compares false
    expected.0.ct_eq(&sig.0).into()
}
