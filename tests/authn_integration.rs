use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tower::ServiceExt; // for Router::oneshot

use turnstile::client::Client;
use turnstile::config::{Config, ServiceConfig};
use turnstile::keystore::{FileLoader, KeyStore};
use turnstile::proxy::{create_router, AppState};
use turnstile::security::signature::Algorithm;

const IDENTITY: &str = "7bf9708aa51b7f7859d0e68b6b62b8ab";
const SECRET: &str = "6jzQ+NyqY7PwOFpipttvbp53baOI/bqGdn4DMc2ALN2v3+rcNYWz/T4r+jORJHBq";

fn key_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"{IDENTITY}": "{SECRET}"}}"#).unwrap();
    file.flush().unwrap();
    file
}

async fn router_with_service(keys: &NamedTempFile, service: Option<ServiceConfig>) -> Router {
    let config = Arc::new(Config {
        service,
        ..Config::default()
    });

    let store = KeyStore::new(Arc::new(FileLoader::new(keys.path().to_str().unwrap())));
    store.reload().await;

    let state = Arc::new(AppState::new(config, store).unwrap());
    create_router(state)
}

/// An in-process upstream that reports the correlation identifier it saw.
async fn spawn_upstream() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let app = Router::new().route(
        "/after/it",
        get(|headers: HeaderMap| async move {
            let identifier = headers
                .get("x-request-identifier")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_string();

            Json(json!({"body": "Hello, world!", "identifier": identifier}))
        }),
    );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    port
}

fn signed_client() -> Client {
    Client::new(Algorithm::Sha256, IDENTITY, SECRET)
}

fn build_request(method: &str, path: &str, headers: &HeaderMap, body: &[u8]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

async fn response_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn valid_request_is_accepted_and_forwarded() {
    let keys = key_file();
    let port = spawn_upstream().await;
    let app = router_with_service(
        &keys,
        Some(ServiceConfig {
            port,
            hostname: "127.0.0.1".to_string(),
        }),
    )
    .await;

    let headers = signed_client()
        .headers("GET", "/after/it", "localhost", b"")
        .unwrap();
    let response = app
        .oneshot(build_request("GET", "/after/it", &headers, b""))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "Hello, world!");

    // the correlation identifier was generated and forwarded upstream
    assert_ne!(body["identifier"], "");
}

#[tokio::test]
async fn stale_date_is_rejected() {
    let keys = key_file();
    let app = router_with_service(&keys, None).await;

    // Thu Mar 24 2016: well outside any skew window
    let headers = signed_client()
        .headers_at("GET", "/after/it", "localhost", b"", 1_458_793_077_000)
        .unwrap();
    let response = app
        .oneshot(build_request("GET", "/after/it", &headers, b""))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["name"], "Unauthorized");
    assert_eq!(body["metadata"]["reason"], "Request date skew is too large");
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let keys = key_file();
    let app = router_with_service(&keys, None).await;

    let headers = signed_client()
        .headers("POST", "/after/it", "localhost", b"knock knock")
        .unwrap();
    // body changed after the digest header was computed
    let response = app
        .oneshot(build_request("POST", "/after/it", &headers, b"knock knocK"))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["metadata"]["reason"],
        "Digest header does not match request body"
    );
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let keys = key_file();
    let app = router_with_service(&keys, None).await;

    let mut headers = signed_client()
        .headers("GET", "/after/it", "localhost", b"")
        .unwrap();

    let forged = Client::new(Algorithm::Sha256, IDENTITY, "wrong-secret")
        .headers("GET", "/after/it", "localhost", b"")
        .unwrap();
    headers.insert("authorization", forged["authorization"].clone());

    let response = app
        .oneshot(build_request("GET", "/after/it", &headers, b""))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["metadata"]["reason"], "Invalid authentication factors");
}

#[tokio::test]
async fn unsigned_request_is_rejected() {
    let keys = key_file();
    let app = router_with_service(&keys, None).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/after/it")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(body["name"], "BadRequest");
    assert_eq!(body["message"], "Bad Request");
    assert_eq!(body["metadata"]["reason"], "Missing header authorization");
}

#[tokio::test]
async fn unknown_identity_is_rejected() {
    let keys = key_file();
    let app = router_with_service(&keys, None).await;

    let headers = Client::new(Algorithm::Sha256, "ghost-identity", SECRET)
        .headers("GET", "/after/it", "localhost", b"")
        .unwrap();
    let response = app
        .oneshot(build_request("GET", "/after/it", &headers, b""))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["metadata"]["reason"], "Invalid authentication factors");
}

#[tokio::test]
async fn rotated_secret_still_authenticates() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"{IDENTITY}": ["retired-secret", "{SECRET}"]}}"#).unwrap();
    file.flush().unwrap();

    let port = spawn_upstream().await;
    let app = router_with_service(
        &file,
        Some(ServiceConfig {
            port,
            hostname: "127.0.0.1".to_string(),
        }),
    )
    .await;

    let headers = signed_client()
        .headers("GET", "/after/it", "localhost", b"")
        .unwrap();
    let response = app
        .oneshot(build_request("GET", "/after/it", &headers, b""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn authenticated_request_without_upstream_is_not_found() {
    let keys = key_file();
    let app = router_with_service(&keys, None).await;

    let headers = signed_client()
        .headers("GET", "/after/it", "localhost", b"")
        .unwrap();
    let response = app
        .oneshot(build_request("GET", "/after/it", &headers, b""))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["name"], "NotFound");
    assert_eq!(body["metadata"]["method"], "GET");
    assert_eq!(body["metadata"]["path"], "/after/it");
}

#[tokio::test]
async fn existing_correlation_identifier_is_preserved() {
    let keys = key_file();
    let port = spawn_upstream().await;
    let app = router_with_service(
        &keys,
        Some(ServiceConfig {
            port,
            hostname: "127.0.0.1".to_string(),
        }),
    )
    .await;

    let mut headers = signed_client()
        .headers("GET", "/after/it", "localhost", b"")
        .unwrap();
    headers.insert("x-request-identifier", "fixed-id".parse().unwrap());

    let response = app
        .oneshot(build_request("GET", "/after/it", &headers, b""))
        .await
        .unwrap();

    let (status, body) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identifier"], "fixed-id");
}
