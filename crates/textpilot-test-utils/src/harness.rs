// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for session and gateway integration tests.
//!
//! `TestHarness` assembles a [`SessionRegistry`] backed by a
//! [`MockEngineFactory`] and a temporary sessions directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use textpilot_core::error::GatewayError;
use textpilot_core::types::EventEnvelope;
use textpilot_session::{Bridge, RegistryConfig, Session, SessionOptions, SessionRegistry, SessionState};
use tokio_util::sync::CancellationToken;

use crate::mock_engine::{MockEngine, MockEngineFactory};

/// How long harness helpers wait before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    options: SessionOptions,
    auto_connect: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            options: SessionOptions::default(),
            auto_connect: false,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.options.event_queue_capacity = capacity;
        self
    }

    pub fn with_backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.options.backpressure_timeout = timeout;
        self
    }

    /// Mock engines emit `Connected` as soon as the session connects.
    pub fn with_auto_connect(mut self) -> Self {
        self.auto_connect = true;
        self
    }

    pub fn build(self) -> Result<TestHarness, GatewayError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|err| GatewayError::internal("failed to create temp dir", err))?;

        let factory = Arc::new(MockEngineFactory::new());
        factory.set_auto_connect(self.auto_connect);

        let mut config = RegistryConfig::new(temp_dir.path());
        config.session = self.options;
        let registry = Arc::new(SessionRegistry::new(factory.clone(), config));

        Ok(TestHarness {
            factory,
            registry,
            shutdown: CancellationToken::new(),
            temp_dir,
        })
    }
}

/// A registry over mock engines in a throwaway sessions directory.
pub struct TestHarness {
    pub factory: Arc<MockEngineFactory>,
    pub registry: Arc<SessionRegistry>,
    pub shutdown: CancellationToken,
    temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn sessions_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Creates a session and returns it with its mock engine.
    pub async fn create_session(&self) -> Result<(Arc<Session>, Arc<MockEngine>), GatewayError> {
        let id = self.registry.create_session().await?;
        let session = self.registry.require(&id).await?;
        let engine = self
            .factory
            .engine_for_session(&id)
            .await
            .ok_or_else(|| GatewayError::Internal {
                message: format!("no mock engine for session {id}"),
                source: None,
            })?;
        Ok((session, engine))
    }

    /// Creates a session directory with a state file but does not register it.
    pub fn seed_session_dir(&self, session_id: &str) -> std::io::Result<()> {
        let config = self.registry.config();
        std::fs::create_dir_all(config.session_dir(session_id))?;
        std::fs::write(config.state_path(session_id), b"")
    }

    /// Creates a session directory without a state file.
    pub fn seed_empty_session_dir(&self, session_id: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.registry.config().session_dir(session_id))
    }

    pub async fn open_stream(&self, session_id: &str) -> Result<Bridge, GatewayError> {
        self.registry.open_stream(session_id, &self.shutdown).await
    }
}

/// Waits until `session` reaches `state`. Returns `false` on timeout.
pub async fn wait_for_state(session: &Session, state: SessionState) -> bool {
    let mut rx = session.subscribe_state();
    tokio::time::timeout(WAIT_TIMEOUT, rx.wait_for(|current| *current == state))
        .await
        .is_ok_and(|result| result.is_ok())
}

/// Next envelope from `bridge`, or `None` on end of stream or timeout.
pub async fn next_envelope(bridge: &mut Bridge) -> Option<EventEnvelope> {
    tokio::time::timeout(WAIT_TIMEOUT, bridge.next())
        .await
        .ok()
        .flatten()
}

/// Drains `bridge` until it ends. `None` if it does not end in time.
pub async fn drain(mut bridge: Bridge) -> Option<Vec<EventEnvelope>> {
    tokio::time::timeout(WAIT_TIMEOUT, async move {
        let mut envelopes = Vec::new();
        while let Some(envelope) = bridge.next().await {
            envelopes.push(envelope);
        }
        envelopes
    })
    .await
    .ok()
}
