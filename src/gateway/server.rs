use super::handlers::{handle_chat_stream, handle_health, handle_launch_verify};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};
use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{Method, StatusCode, header},
    routing::{get, post},
};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Run the HTTP gateway until `shutdown` resolves.
pub async fn run_gateway<F>(config: &Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .context("parse gateway bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind gateway socket")?;

    run_gateway_with_listener(listener, config, shutdown).await
}

/// Run the HTTP gateway from a pre-bound listener.
pub async fn run_gateway_with_listener<F>(
    listener: tokio::net::TcpListener,
    config: &Config,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener
        .local_addr()
        .context("get gateway listener local address")?;

    let state = AppState::from_config(config);
    if state.verifier.is_none() {
        tracing::warn!("no bot token configured; /api/launch/verify will answer 503");
    }
    tracing::info!(addr = %local_addr, "gateway listening");

    let app = build_app(state, &config.gateway.allowed_origins);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("serve HTTP gateway")?;

    tracing::info!("gateway stopped");
    Ok(())
}

pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let mut app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/launch/verify", post(handle_launch_verify))
        .route("/v1/chat/stream", post(handle_chat_stream))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    if !allowed_origins.is_empty() {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        );
    }

    app
}
