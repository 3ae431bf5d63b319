use base64::{engine::general_purpose, Engine};
use tracing::debug;

use crate::errors::Error;
use crate::security::signature::Algorithm;

/// The identity and claimed signature carried by the Authorization header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: String,
    pub signature: String,
}

/// Parse an Authorization header of the form
/// `"{Scheme} {base64(identity:signature)}"`.
pub fn parse(algorithm: Algorithm, header: &str, identifier: &str) -> Result<Credentials, Error> {
    let parts: Vec<&str> = header.split(' ').collect();

    if parts.len() != 2 {
        return Err(Error::request("Invalid Authorization header"));
    }

    let scheme = algorithm.scheme();
    if parts[0] != scheme {
        return Err(Error::authorization(format!(
            "Invalid authentication protocol {}",
            parts[0]
        )));
    }

    debug!(identifier = %identifier, "Using Authorization Scheme: {}", parts[0]);

    let decoded = general_purpose::STANDARD
        .decode(parts[1])
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| Error::authorization("Invalid authentication parameters"))?;

    let parameters: Vec<&str> = decoded.split(':').collect();

    if parameters.len() != 2 {
        return Err(Error::authorization("Invalid authentication parameters"));
    }

    Ok(Credentials {
        identity: parameters[0].to_string(),
        signature: parameters[1].to_string(),
    })
}
