// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use textpilot_core::error::GatewayError;
use textpilot_session::SessionRegistry;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Health state for the `/health` endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<SessionRegistry>,
    /// Cancelled on process shutdown; ends every open event stream.
    pub shutdown: CancellationToken,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(registry: Arc<SessionRegistry>, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            shutdown,
            health: HealthState {
                start_time: Instant::now(),
            },
        }
    }
}

/// Gateway server configuration (mirrors `[server]` from textpilot-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `"*"` allows any origin.
    pub cors_allowed_origins: Vec<String>,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = origin.as_str(), "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the application router:
/// - POST /clients/connect
/// - GET /clients
/// - GET /clients/{client_id}/events (SSE)
/// - POST /clients/{client_id}/disconnect
/// - POST /clients/{client_id}/messages/send
/// - GET /clients/{client_id}/messages/{message_id}
/// - GET /clients/{client_id}/chats
/// - GET /clients/{client_id}/chats/{chat_id}
/// - GET /health
pub fn build_router(state: GatewayState, cors_allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/clients", get(handlers::list_clients))
        .route("/clients/connect", post(handlers::connect))
        .route("/clients/{client_id}/events", get(handlers::events))
        .route("/clients/{client_id}/disconnect", post(handlers::disconnect))
        .route("/clients/{client_id}/messages/send", post(handlers::send_message))
        .route(
            "/clients/{client_id}/messages/{message_id}",
            get(handlers::get_message),
        )
        .route("/clients/{client_id}/chats", get(handlers::list_chats))
        .route("/clients/{client_id}/chats/{chat_id}", get(handlers::get_chat))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_allowed_origins))
        .with_state(state)
}

/// Serves the gateway until `state.shutdown` is cancelled.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), GatewayError> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state, &config.cors_allowed_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::internal(format!("failed to bind gateway to {addr}"), e))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| GatewayError::internal("gateway server error", e))?;

    tracing::info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8082,
            cors_allowed_origins: vec!["*".to_string()],
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
        assert!(debug.contains("8082"));
    }

    #[test]
    fn explicit_origins_build_a_layer() {
        let _layer = cors_layer(&[
            "https://app.example.com".to_string(),
            "bad\norigin".to_string(),
        ]);
    }
}
