use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONNECTION, TRANSFER_ENCODING};
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::errors::Error;
use crate::proxy::AppState;

/// Body size accepted for forwarding; the digest check upstream of this
/// handler has already buffered within the same bound.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Forward an authenticated request to the configured upstream service and
/// stream its response back unchanged.
pub async fn handle(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(service) = &state.config.service else {
        return Error::not_found(method.as_str(), &path).into_response();
    };

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(&path);
    let url = format!("http://{}:{}{}", service.hostname, service.port, target);

    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return Error::internal(format!("reading request body: {err}")).into_response();
        }
    };

    debug!(method = %method, url = %url, "forwarding request");

    let upstream = state
        .client
        .request(method, &url)
        .headers(parts.headers)
        .body(bytes)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(err) => {
            error!(url = %url, error = %err, "upstream request failed");
            return Error::internal(format!("forwarding to {url}: {err}")).into_response();
        }
    };

    let status = upstream.status();
    let mut headers = upstream.headers().clone();

    // hop-by-hop headers are between us and the upstream, not the client
    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    response
}
