use axum::http::{HeaderMap, HeaderValue};
use base64::{engine::general_purpose, Engine};
use chrono::Utc;
use tracing::debug;

use crate::errors::Error;
use crate::security::digest;
use crate::security::signature::{Algorithm, SignableRequest, Signature};

/// Builds the header set a client must send for a request to authenticate:
/// `date` (epoch milliseconds), `digest`, `host` and the signed
/// `Authorization` header. The reference client for the integration tests.
#[derive(Debug, Clone)]
pub struct Client {
    algorithm: Algorithm,
    identity: String,
    secret: String,
}

impl Client {
    pub fn new(algorithm: Algorithm, identity: &str, secret: &str) -> Self {
        Client {
            algorithm,
            identity: identity.to_string(),
            secret: secret.to_string(),
        }
    }

    /// Sign a request dated now.
    pub fn headers(
        &self,
        method: &str,
        path: &str,
        host: &str,
        body: &[u8],
    ) -> Result<HeaderMap, Error> {
        self.headers_at(method, path, host, body, Utc::now().timestamp_millis())
    }

    /// Sign a request with an explicit date, for skew tests.
    pub fn headers_at(
        &self,
        method: &str,
        path: &str,
        host: &str,
        body: &[u8],
        date: i64,
    ) -> Result<HeaderMap, Error> {
        let digest_header = digest::compute(self.algorithm, body);

        let signable = SignableRequest::new(
            method,
            Some(path),
            None,
            host,
            date,
            &self.identity,
            &digest_header,
        )?;

        let mut signature = Signature::new(self.algorithm, signable);
        let signed = signature.sign(&self.secret).to_string();

        debug!("Request: identity {}", self.identity);
        debug!("Request: signature {}", signed);

        let parameters = general_purpose::STANDARD.encode(format!("{}:{signed}", self.identity));
        let authorization = format!("{} {parameters}", self.algorithm.scheme());

        let mut headers = HeaderMap::new();
        headers.insert("host", value(host)?);
        headers.insert("date", value(&date.to_string())?);
        headers.insert("digest", value(&digest_header)?);
        headers.insert("authorization", value(&authorization)?);

        Ok(headers)
    }
}

fn value(raw: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(raw).map_err(|_| Error::request(format!("Invalid header value {raw}")))
}
