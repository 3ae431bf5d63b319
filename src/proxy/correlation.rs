use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;
use uuid::Uuid;

use crate::proxy::AppState;

/// Request-correlation identifier, used only for log correlation. Never
/// part of the signature.
#[derive(Debug, Clone, Default)]
pub struct CorrelationId(pub String);

/// Read the configured correlation header, or generate a fresh identifier
/// and set it so the upstream service sees the same value.
pub async fn middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = &state.correlation_header;

    let identifier = match request
        .headers()
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    {
        Some(found) => {
            debug!(identifier = %found, "Found Correlation-Identifier header {header}:{found}");
            found
        }
        None => {
            let generated = Uuid::new_v4().to_string();

            if let Ok(value) = HeaderValue::from_str(&generated) {
                request.headers_mut().insert(header.clone(), value);
            }

            debug!(identifier = %generated, "Setting Correlation-Identifier header {header}:{generated}");
            generated
        }
    };

    request.extensions_mut().insert(CorrelationId(identifier));
    next.run(request).await
}
