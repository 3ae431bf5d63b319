use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::errors::Error;
use crate::keystore::KeyStore;
use crate::proxy::correlation::CorrelationId;
use crate::proxy::AppState;
use crate::security::signature::{Algorithm, SignableRequest, Signature};
use crate::security::{authorization, digest, validate};

/// Verifying the digest requires the whole body in memory
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// The authentication controller: validates request parameters, checks the
/// body digest, parses the Authorization header, resolves the identity's
/// secrets and verifies the signature. Stateless across requests.
#[derive(Clone)]
pub struct Authenticator {
    algorithm: Algorithm,
    skew: i64,
    store: KeyStore,
}

impl Authenticator {
    pub fn new(algorithm: Algorithm, skew: i64, store: KeyStore) -> Self {
        Authenticator {
            algorithm,
            skew,
            store,
        }
    }

    pub async fn authenticate(
        &self,
        parts: &Parts,
        body: &[u8],
        identifier: &str,
    ) -> Result<(), Error> {
        debug!(identifier = %identifier, "Enforcing token validator");

        let date = validate::validate(self.skew, &parts.headers, identifier)?;

        // validate() guarantees presence; non-UTF8 values are malformed input
        let digest_header = header_str(parts, "digest")?;
        digest::validate(self.algorithm, digest_header, body)?;

        let credentials =
            authorization::parse(self.algorithm, header_str(parts, "authorization")?, identifier)?;

        let secrets = self.store.lookup(&credentials.identity).await?;

        let target = parts.uri.path_and_query().map(|pq| pq.as_str());
        let signable = SignableRequest::new(
            parts.method.as_str(),
            target,
            Some(parts.uri.path()),
            header_str(parts, "host")?,
            date,
            &credentials.identity,
            digest_header,
        )?;

        // Try each candidate secret, stopping at the first that verifies.
        // Surface the last failure; the generic factors error covers an
        // empty candidate set.
        let mut error = Error::authorization("Invalid authentication factors");

        for secret in secrets.candidates() {
            let mut challenge = Signature::new(self.algorithm, signable.clone());
            let signed = challenge.sign(secret).to_string();

            debug!(identifier = %identifier, "Request Signature: {}", credentials.signature);
            debug!(identifier = %identifier, "Challenge Signature: {}", signed);

            match challenge.verify(&credentials.signature) {
                Ok(()) => {
                    debug!(identifier = %identifier, "Authenticated. Forwarding request");
                    return Ok(());
                }
                Err(err) => error = err,
            }
        }

        Err(error)
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, Error> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::request(format!("Missing header {name}")))
}

/// Middleware adapter: buffer the body once, authenticate, and either pass
/// the reassembled request downstream or render the rejection.
pub async fn middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let identifier = request
        .extensions()
        .get::<CorrelationId>()
        .cloned()
        .unwrap_or_default();

    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return Error::internal(format!("reading request body: {err}")).into_response();
        }
    };

    match state
        .authenticator
        .authenticate(&parts, &bytes, &identifier.0)
        .await
    {
        Ok(()) => {
            next.run(Request::from_parts(parts, Body::from(bytes)))
                .await
        }
        Err(err) => err.with_identifier(&identifier.0).into_response(),
    }
}
