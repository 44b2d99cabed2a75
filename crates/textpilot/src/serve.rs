// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `textpilot serve` command implementation.
//!
//! Restores persisted sessions, serves the HTTP gateway until a shutdown
//! signal arrives, then tears every session down.

use std::sync::Arc;
use std::time::Duration;

use textpilot_config::TextpilotConfig;
use textpilot_core::error::GatewayError;
use textpilot_gateway::{start_server, GatewayState, ServerConfig};
use textpilot_loopback::LoopbackFactory;
use textpilot_session::{install_signal_handler, RegistryConfig, SessionOptions, SessionRegistry};
use tracing::{info, warn};

/// Registry settings derived from the `[sessions]` section.
pub fn registry_config(config: &TextpilotConfig) -> RegistryConfig {
    RegistryConfig {
        directory: config.sessions.directory.clone().into(),
        state_file: config.sessions.state_file.clone(),
        session: SessionOptions {
            event_queue_capacity: config.sessions.event_queue_capacity,
            backpressure_timeout: Duration::from_secs(config.sessions.backpressure_timeout_secs),
        },
    }
}

/// Listener settings derived from the `[server]` section.
pub fn server_config(config: &TextpilotConfig) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        cors_allowed_origins: config.server.cors_allowed_origins.clone(),
    }
}

pub async fn run_serve(config: TextpilotConfig) -> Result<(), GatewayError> {
    init_tracing(&config.logging.level);

    info!("starting textpilot serve");

    let registry = Arc::new(SessionRegistry::new(
        Arc::new(LoopbackFactory::default()),
        registry_config(&config),
    ));

    let summary = registry.reload_all().await?;
    info!(
        restored = summary.restored.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "sessions reloaded"
    );
    if !summary.failed.is_empty() {
        warn!(sessions = ?summary.failed, "some sessions could not be restored");
    }

    let shutdown = install_signal_handler();
    let state = GatewayState::new(Arc::clone(&registry), shutdown.clone());
    let result = start_server(&server_config(&config), state).await;

    // Also reached when the listener fails; sessions still need teardown.
    shutdown.cancel();
    registry.shutdown_all().await;

    result?;
    info!("textpilot serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "textpilot={log_level},textpilot_session={log_level},textpilot_gateway={log_level},\
             textpilot_loopback={log_level},tower_http={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
