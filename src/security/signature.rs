use std::fmt;

use base64::{engine::general_purpose, Engine};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::errors::Error;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Supported HMAC digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "SHA256" => Ok(Algorithm::Sha256),
            "SHA512" => Ok(Algorithm::Sha512),
            other => anyhow::bail!("unsupported digest algorithm {other}"),
        }
    }

    /// The Authorization scheme literal for this algorithm,
    /// e.g. `Rapid7-HMAC-V1-SHA256`.
    pub fn scheme(&self) -> String {
        format!("Rapid7-HMAC-V1-{self}")
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Sha256 => write!(f, "SHA256"),
            Algorithm::Sha512 => write!(f, "SHA512"),
        }
    }
}

/// Immutable view of the request fields that participate in the signature.
///
/// Both signer and verifier must reproduce the exact same canonical byte
/// sequence from these fields, so construction is the only place the field
/// order and encoding are defined.
#[derive(Debug, Clone)]
pub struct SignableRequest {
    method: String,
    uri: String,
    host: String,
    /// Request date as milliseconds since the epoch
    date: i64,
    identity: String,
    digest: String,
}

impl SignableRequest {
    /// Build the signable view. `url` carries the request-target (path and
    /// query); older clients expose it under a bare `path` field instead, so
    /// `url` is preferred and `path` accepted as a fallback.
    pub fn new(
        method: &str,
        url: Option<&str>,
        path: Option<&str>,
        host: &str,
        date: i64,
        identity: &str,
        digest: &str,
    ) -> Result<Self, Error> {
        let uri = url
            .or(path)
            .ok_or_else(|| Error::request("Missing request URL"))?;

        Ok(SignableRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            host: host.to_string(),
            date,
            identity: identity.to_string(),
            digest: digest.to_string(),
        })
    }

    /// The canonical signing string: one line per field, each terminated by
    /// LF (the last included).
    fn canonical(&self) -> String {
        format!(
            "{} {}\n{}\n{}\n{}\n{}\n",
            self.method, self.uri, self.host, self.date, self.identity, self.digest
        )
    }
}

/// One sign/verify exchange. Created fresh per verification attempt and
/// never reused across identities or secrets.
#[derive(Debug)]
pub struct Signature {
    algorithm: Algorithm,
    request: SignableRequest,
    signature: Option<String>,
}

impl Signature {
    pub fn new(algorithm: Algorithm, request: SignableRequest) -> Self {
        Signature {
            algorithm,
            request,
            signature: None,
        }
    }

    /// Compute the base64 HMAC over the canonical signing string, keyed by
    /// `secret`. The result is retained as the reference for `verify`.
    pub fn sign(&mut self, secret: &str) -> &str {
        let canonical = self.request.canonical();

        let digest = match self.algorithm {
            Algorithm::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                    .expect("HMAC can take key of any size");
                mac.update(canonical.as_bytes());
                general_purpose::STANDARD.encode(mac.finalize().into_bytes())
            }
            Algorithm::Sha512 => {
                let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
                    .expect("HMAC can take key of any size");
                mac.update(canonical.as_bytes());
                general_purpose::STANDARD.encode(mac.finalize().into_bytes())
            }
        };

        self.signature = Some(digest);
        self.signature.as_deref().unwrap_or_default()
    }

    /// Compare a candidate signature against the reference produced by
    /// `sign`. Constant-time; a length mismatch is just a failed match.
    pub fn verify(&self, candidate: &str) -> Result<(), Error> {
        let reference = self
            .signature
            .as_deref()
            .ok_or_else(|| Error::internal("verify called before sign"))?;

        if reference.as_bytes().ct_eq(candidate.as_bytes()).unwrap_u8() == 1 {
            Ok(())
        } else {
            Err(Error::authorization("Invalid authentication factors"))
        }
    }
}
