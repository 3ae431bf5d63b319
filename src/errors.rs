use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Typed HTTP errors produced by the authentication core and the proxy
/// surfaces. Serialized for clients as
/// `{code, name, message, metadata}`.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Malformed or missing client input (400)
    #[error("{reason}")]
    Request {
        reason: String,
        identifier: Option<String>,
    },

    /// Well-formed request that failed a trust check (401)
    #[error("{reason}")]
    Authorization {
        reason: String,
        identifier: Option<String>,
    },

    /// No handler matched the request (404)
    #[error("no handler for {method} {path}")]
    NotFound { method: String, path: String },

    /// Anything else (500). The detail is logged, never rendered.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn request(reason: impl Into<String>) -> Self {
        Error::Request {
            reason: reason.into(),
            identifier: None,
        }
    }

    pub fn authorization(reason: impl Into<String>) -> Self {
        Error::Authorization {
            reason: reason.into(),
            identifier: None,
        }
    }

    pub fn not_found(method: impl Into<String>, path: impl Into<String>) -> Self {
        Error::NotFound {
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Error::Internal(detail.into())
    }

    /// Attach a correlation identifier for the error metadata.
    pub fn with_identifier(mut self, id: &str) -> Self {
        match &mut self {
            Error::Request { identifier, .. } | Error::Authorization { identifier, .. } => {
                *identifier = Some(id.to_string());
            }
            _ => {}
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Request { .. } => StatusCode::BAD_REQUEST,
            Error::Authorization { .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Error::Request { .. } => "BadRequest",
            Error::Authorization { .. } => "Unauthorized",
            Error::NotFound { .. } => "NotFound",
            Error::Internal(_) => "InternalServerError",
        }
    }

    fn metadata(&self) -> Value {
        match self {
            Error::Request { reason, identifier }
            | Error::Authorization { reason, identifier } => json!({
                "reason": reason,
                "identifier": identifier,
            }),
            Error::NotFound { method, path } => json!({
                "method": method,
                "path": path,
            }),
            Error::Internal(_) => json!({}),
        }
    }

    /// The client-facing message. Internal details stay out of the body.
    fn message(&self) -> &'static str {
        match self {
            Error::Request { .. } => "Bad Request",
            Error::Authorization { .. } => "Unauthorized",
            Error::NotFound { .. } => "Not Found",
            Error::Internal(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::Internal(detail) = &self {
            tracing::error!(error = %detail, "internal error");
        } else {
            debug!(error = %self, "rejecting request");
        }

        let status = self.status();
        let body = json!({
            "code": status.as_u16(),
            "name": self.name(),
            "message": self.message(),
            "metadata": self.metadata(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(format!("{err:#}"))
    }
}
