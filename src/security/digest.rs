use base64::{engine::general_purpose, Engine};
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::errors::Error;
use crate::security::signature::Algorithm;

/// Compute the digest-header value for a request body:
/// `{ALGORITHM}={base64(hash(body))}`.
pub fn compute(algorithm: Algorithm, body: &[u8]) -> String {
    let hash = match algorithm {
        Algorithm::Sha256 => general_purpose::STANDARD.encode(Sha256::digest(body)),
        Algorithm::Sha512 => general_purpose::STANDARD.encode(Sha512::digest(body)),
    };

    format!("{algorithm}={hash}")
}

/// Verify that the digest header matches the raw request body. Independent
/// of signature validity; guards against body tampering after signing.
pub fn validate(algorithm: Algorithm, digest_header: &str, body: &[u8]) -> Result<(), Error> {
    let expected = compute(algorithm, body);

    if expected.as_bytes().ct_eq(digest_header.as_bytes()).unwrap_u8() == 1 {
        Ok(())
    } else {
        Err(Error::authorization(
            "Digest header does not match request body",
        ))
    }
}
