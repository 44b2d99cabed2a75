// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Engine`] implementation that never leaves the process.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::Utc;
use textpilot_core::error::EngineError;
use textpilot_core::jid::{Jid, USER_SERVER};
use textpilot_core::traits::engine::{
    Contact, Engine, EngineEvent, EngineEventHandler, EngineFactory, GroupInfo, InboundMessage,
    MessageBody, ProfilePicture, SendReceipt,
};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::LoopbackStore;

/// Delay between showing the pairing code and completing pairing.
pub const DEFAULT_PAIRING_DELAY: Duration = Duration::from_secs(2);

/// Generates a fresh pairing challenge payload.
fn pairing_code() -> String {
    format!("2@{}", uuid::Uuid::new_v4().simple())
}

/// Generates the identity assigned to a newly paired device.
fn generate_device_jid() -> Jid {
    let digits = uuid::Uuid::new_v4().as_u128() % 10_000_000_000;
    Jid {
        user: format!("1555{digits:010}"),
        server: USER_SERVER.to_string(),
        device: Some(1),
    }
}

fn message_id() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!("3EB0{}", &raw[..16])
}

struct Inner {
    store: LoopbackStore,
    handler: OnceLock<Arc<dyn EngineEventHandler>>,
    own_jid: ArcSwapOption<Jid>,
    connected: AtomicBool,
    stop: Mutex<CancellationToken>,
    pairing_delay: Duration,
}

impl Inner {
    async fn emit(&self, event: EngineEvent) {
        match self.handler.get() {
            Some(handler) => handler.handle(event).await,
            None => debug!("no event handler registered, event dropped"),
        }
    }
}

/// Loopback engine bound to one session's device store.
///
/// Pairing shows one QR code, waits for the pairing delay, then assigns a
/// generated identity. Text sent to a user chat comes back as an inbound
/// message from that user.
pub struct LoopbackEngine {
    inner: Arc<Inner>,
}

impl LoopbackEngine {
    pub async fn open(path: &Path, pairing_delay: Duration) -> Result<Self, EngineError> {
        let store = LoopbackStore::open(path).await?;
        Self::with_store(store, pairing_delay).await
    }

    pub async fn with_store(
        store: LoopbackStore,
        pairing_delay: Duration,
    ) -> Result<Self, EngineError> {
        let own_jid = store.device_jid().await?;
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                handler: OnceLock::new(),
                own_jid: ArcSwapOption::from(own_jid.map(Arc::new)),
                connected: AtomicBool::new(false),
                stop: Mutex::new(CancellationToken::new()),
                pairing_delay,
            }),
        })
    }

    pub fn store(&self) -> &LoopbackStore {
        &self.inner.store
    }

    /// Whether a device is paired and the connection is live.
    pub fn is_logged_in(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire) && self.inner.own_jid.load().is_some()
    }

    /// Runs the pairing exchange. Returns `false` if stopped before it completed.
    async fn pair(&self, stop: &CancellationToken) -> Result<bool, EngineError> {
        self.inner
            .emit(EngineEvent::Qr {
                codes: vec![pairing_code()],
            })
            .await;

        tokio::select! {
            biased;
            _ = stop.cancelled() => return Ok(false),
            _ = tokio::time::sleep(self.inner.pairing_delay) => {}
        }

        let jid = generate_device_jid();
        self.inner.store.save_device(&jid).await?;
        info!(jid = %jid, "loopback device paired");
        self.inner.own_jid.store(Some(Arc::new(jid)));
        Ok(true)
    }

    fn require_connected(&self) -> Result<(), EngineError> {
        if self.inner.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(EngineError::NotConnected)
        }
    }
}

#[async_trait]
impl Engine for LoopbackEngine {
    fn set_event_handler(&self, handler: Arc<dyn EngineEventHandler>) {
        if self.inner.handler.set(handler).is_err() {
            warn!("event handler already registered, ignoring replacement");
        }
    }

    async fn connect(&self) -> Result<(), EngineError> {
        let stop = {
            let mut guard = self.inner.stop.lock().await;
            if guard.is_cancelled() {
                *guard = CancellationToken::new();
            }
            guard.clone()
        };

        if self.inner.own_jid.load().is_none() && !self.pair(&stop).await? {
            debug!("pairing interrupted by disconnect");
            return Ok(());
        }
        if stop.is_cancelled() {
            return Ok(());
        }

        self.inner.connected.store(true, Ordering::Release);
        self.inner.emit(EngineEvent::Connected).await;
        Ok(())
    }

    async fn disconnect(&self) {
        self.inner.stop.lock().await.cancel();
        if self.inner.connected.swap(false, Ordering::AcqRel) {
            debug!("loopback engine disconnected");
        }
    }

    fn own_jid(&self) -> Option<Jid> {
        self.inner.own_jid.load_full().map(|jid| (*jid).clone())
    }

    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, EngineError> {
        self.require_connected()?;
        let own = self.own_jid().ok_or(EngineError::NotConnected)?;
        let receipt = SendReceipt { id: message_id() };

        if to.is_group() {
            if self.inner.store.group(to).await?.is_none() {
                return Err(EngineError::NotFound(to.to_string()));
            }
            return Ok(receipt);
        }

        let chat = to.to_non_device();
        self.inner
            .store
            .upsert_contact(&Contact {
                jid: Some(chat.clone()),
                ..Contact::default()
            })
            .await?;

        let echo = InboundMessage {
            id: message_id(),
            timestamp: Utc::now(),
            chat: chat.clone(),
            sender: chat,
            is_from_me: false,
            body: MessageBody {
                conversation: Some(text.to_string()),
                extended_text: None,
            },
        };
        debug!(from = %own.to_non_device(), to = %echo.chat, "queueing loopback echo");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if inner.connected.load(Ordering::Acquire) {
                inner.emit(EngineEvent::Message(echo)).await;
            }
        });

        Ok(receipt)
    }

    async fn contacts(&self) -> Result<Vec<Contact>, EngineError> {
        self.inner.store.contacts().await
    }

    async fn contact(&self, jid: &Jid) -> Result<Contact, EngineError> {
        if jid.is_group() {
            let group = self
                .inner
                .store
                .group(jid)
                .await?
                .ok_or_else(|| EngineError::NotFound(jid.to_string()))?;
            return Ok(Contact {
                jid: Some(group.jid),
                full_name: Some(group.name),
                ..Contact::default()
            });
        }
        self.inner
            .store
            .contact(jid)
            .await?
            .ok_or_else(|| EngineError::NotFound(jid.to_string()))
    }

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, EngineError> {
        self.inner.store.groups().await
    }

    async fn group_info(&self, jid: &Jid) -> Result<GroupInfo, EngineError> {
        self.inner
            .store
            .group(jid)
            .await?
            .ok_or_else(|| EngineError::NotFound(jid.to_string()))
    }

    async fn profile_picture(&self, jid: &Jid) -> Result<ProfilePicture, EngineError> {
        Err(EngineError::NotFound(format!("profile picture for {jid}")))
    }
}

/// Opens a [`LoopbackEngine`] per session state file.
#[derive(Debug, Clone)]
pub struct LoopbackFactory {
    pairing_delay: Duration,
}

impl LoopbackFactory {
    pub fn new(pairing_delay: Duration) -> Self {
        Self { pairing_delay }
    }
}

impl Default for LoopbackFactory {
    fn default() -> Self {
        Self::new(DEFAULT_PAIRING_DELAY)
    }
}

#[async_trait]
impl EngineFactory for LoopbackFactory {
    async fn open(&self, state_path: &Path) -> Result<Arc<dyn Engine>, EngineError> {
        let engine = LoopbackEngine::open(state_path, self.pairing_delay).await?;
        Ok(Arc::new(engine))
    }
}
