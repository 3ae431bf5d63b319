use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderName;
use axum::{middleware, Router};
use reqwest::Client;
use tracing::info;

use crate::config::Config;
use crate::keystore::KeyStore;
use crate::security::authn::{self, Authenticator};
use crate::security::signature::Algorithm;

pub mod correlation;
pub mod forward;

/// Shared server state: configuration, the authentication controller and
/// the keep-alive client for upstream requests. Built once at startup and
/// passed down; no globals.
pub struct AppState {
    pub config: Arc<Config>,
    pub authenticator: Authenticator,
    pub client: Client,
    pub correlation_header: HeaderName,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: KeyStore) -> Result<Self> {
        let algorithm = Algorithm::parse(&config.local.algorithm)?;
        let authenticator = Authenticator::new(algorithm, config.local.skew, store);

        let client = Client::builder()
            .build()
            .context("creating upstream HTTP client")?;

        let correlation_header = HeaderName::from_bytes(config.correlation.header.as_bytes())
            .context("invalid correlation header name")?;

        Ok(AppState {
            config,
            authenticator,
            client,
            correlation_header,
        })
    }
}

/// Assemble the middleware pipeline: correlation identifier first, then the
/// authentication controller, then byte-level forwarding. An error at any
/// layer short-circuits straight to the error renderer.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(forward::handle)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authn::middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            correlation::middleware,
        ))
        .with_state(state)
}

pub async fn serve(config: Config) -> Result<()> {
    let config = Arc::new(config);
    let store = KeyStore::spawn(&config.local.db)?;
    let state = Arc::new(AppState::new(config.clone(), store)?);

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.listen.bind, config.listen.port)
        .parse()
        .context("parsing listen address")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);

    match &config.service {
        Some(service) => info!(
            "forwarding authenticated requests to http://{}:{}",
            service.hostname, service.port
        ),
        None => info!("no upstream service configured"),
    }

    axum::serve(listener, app).await?;
    Ok(())
}
