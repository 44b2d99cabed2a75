// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table of live sessions keyed by session id.
//!
//! One lock covers the whole table. Sessions are human-scale in number and
//! none of the table operations hold the lock across engine calls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use textpilot_core::error::GatewayError;
use textpilot_core::traits::EngineFactory;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bridge::Bridge;
use crate::session::{Session, SessionOptions, SessionState};

/// Where session state lives on disk and how sessions are tuned.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Root holding one subdirectory per session id.
    pub directory: PathBuf,
    /// Engine state file expected inside each session directory.
    pub state_file: String,
    pub session: SessionOptions,
}

impl RegistryConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            state_file: "session.db".to_string(),
            session: SessionOptions::default(),
        }
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.directory.join(session_id)
    }

    pub fn state_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join(&self.state_file)
    }
}

/// Id and state of a registered session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub state: SessionState,
}

/// Outcome of [`SessionRegistry::reload_all`], ids sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub restored: Vec<String>,
    /// Directories without a state file.
    pub skipped: Vec<String>,
    /// Directories whose engine could not be opened or registered.
    pub failed: Vec<String>,
}

/// Process-wide session table, constructed once at startup and passed by handle.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    factory: Arc<dyn EngineFactory>,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn EngineFactory>, config: RegistryConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Registers `session`; an id already present is rejected.
    pub async fn add(&self, session: Arc<Session>) -> Result<(), GatewayError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(session.id()) {
            return Err(GatewayError::SessionAlreadyExists {
                session_id: session.id().to_string(),
            });
        }
        sessions.insert(session.id().to_string(), session);
        Ok(())
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Like [`get`](Self::get), but an unknown id is [`GatewayError::SessionNotFound`].
    pub async fn require(&self, session_id: &str) -> Result<Arc<Session>, GatewayError> {
        self.get(session_id)
            .await
            .ok_or_else(|| GatewayError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Registered sessions ordered by id.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .lock()
            .await
            .values()
            .map(|session| SessionSummary {
                id: session.id().to_string(),
                state: session.state(),
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Allocates a fresh session directory, registers a session on a new
    /// engine, and starts its handshake without waiting for it.
    pub async fn create_session(&self) -> Result<String, GatewayError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = self.config.session_dir(&session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| GatewayError::internal("failed to create session directory", err))?;

        let session = self.open_session(&session_id, &self.config.state_path(&session_id)).await?;
        self.add(Arc::clone(&session)).await?;
        session.connect();

        info!(session_id = session_id.as_str(), dir = %dir.display(), "session created");
        Ok(session_id)
    }

    /// Tears a session down and removes it from the table.
    ///
    /// Durable state on disk is left in place. Of two concurrent closes of
    /// the same id, only the one that removes the entry succeeds.
    pub async fn close_session(&self, session_id: &str) -> Result<(), GatewayError> {
        let session = self.require(session_id).await?;
        session.teardown().await;
        if self.remove(session_id).await.is_none() {
            debug!(session_id, "session already removed by a concurrent close");
            return Err(GatewayError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        info!(session_id, "session removed");
        Ok(())
    }

    /// Attaches a viewer to a registered session.
    pub async fn open_stream(
        &self,
        session_id: &str,
        shutdown: &CancellationToken,
    ) -> Result<Bridge, GatewayError> {
        let session = self.require(session_id).await?;
        Ok(Bridge::open(&session, shutdown).await)
    }

    /// Restores every session directory that holds a state file.
    ///
    /// Each session is registered before its handshake starts. Directories
    /// without a state file are skipped and engine failures are recorded;
    /// neither affects sibling sessions. A missing root directory means
    /// there is nothing to reload.
    pub async fn reload_all(&self) -> Result<ReloadSummary, GatewayError> {
        let mut summary = ReloadSummary::default();

        let mut entries = match tokio::fs::read_dir(&self.config.directory).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    dir = %self.config.directory.display(),
                    "sessions directory does not exist, nothing to reload"
                );
                return Ok(summary);
            }
            Err(err) => {
                return Err(GatewayError::internal("failed to read sessions directory", err));
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| GatewayError::internal("failed to read sessions directory", err))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            let Some(session_id) = entry.file_name().to_str().map(str::to_string) else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 session directory");
                continue;
            };

            let state_path = entry.path().join(&self.config.state_file);
            if !tokio::fs::try_exists(&state_path).await.unwrap_or(false) {
                warn!(
                    session_id = session_id.as_str(),
                    path = %state_path.display(),
                    "state file missing, skipping session"
                );
                summary.skipped.push(session_id);
                continue;
            }

            if self.get(&session_id).await.is_some() {
                debug!(session_id = session_id.as_str(), "session already registered");
                continue;
            }

            let session = match self.open_session(&session_id, &state_path).await {
                Ok(session) => session,
                Err(err) => {
                    error!(session_id = session_id.as_str(), error = %err, "failed to restore session");
                    summary.failed.push(session_id);
                    continue;
                }
            };
            if let Err(err) = self.add(Arc::clone(&session)).await {
                warn!(session_id = session_id.as_str(), error = %err, "failed to register session");
                summary.failed.push(session_id);
                continue;
            }
            session.connect();
            summary.restored.push(session_id);
        }

        summary.restored.sort();
        summary.skipped.sort();
        summary.failed.sort();
        info!(
            restored = summary.restored.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "sessions reloaded"
        );
        Ok(summary)
    }

    /// Tears down and unregisters every session, leaving durable state on disk.
    pub async fn shutdown_all(&self) {
        let sessions: Vec<Arc<Session>> = {
            let mut table = self.sessions.lock().await;
            table.drain().map(|(_, session)| session).collect()
        };
        info!(count = sessions.len(), "closing all sessions");
        futures::future::join_all(sessions.iter().map(|session| session.teardown())).await;
    }

    async fn open_session(
        &self,
        session_id: &str,
        state_path: &Path,
    ) -> Result<Arc<Session>, GatewayError> {
        let engine = self
            .factory
            .open(state_path)
            .await
            .map_err(|err| GatewayError::internal("failed to open session engine", err))?;
        Ok(Session::new(session_id, engine, self.config.session))
    }
}
