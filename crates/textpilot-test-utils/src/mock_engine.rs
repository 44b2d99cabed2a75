// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock protocol engine for deterministic testing.
//!
//! `MockEngine` implements `Engine` with scriptable events, injectable
//! failures, a scripted roster, and captured outbound sends.
//! `MockEngineFactory` hands out mock engines and creates their state files
//! the way a real engine store would.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::sync::Mutex;

use textpilot_core::error::EngineError;
use textpilot_core::jid::Jid;
use textpilot_core::traits::engine::{
    Contact, EngineEvent, GroupInfo, ProfilePicture, SendReceipt,
};
use textpilot_core::traits::{Engine, EngineEventHandler, EngineFactory};

/// A mock messaging engine for testing.
///
/// Events are pushed with [`emit`](MockEngine::emit), which runs the
/// registered handler to completion exactly like an engine callback would.
pub struct MockEngine {
    handler: OnceLock<Arc<dyn EngineEventHandler>>,
    own_jid: Jid,
    auto_connect: AtomicBool,
    fail_connect: AtomicBool,
    fail_sends: AtomicBool,
    fail_contacts: AtomicBool,
    fail_groups: AtomicBool,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    sent: Mutex<Vec<(Jid, String)>>,
    contacts: Mutex<Vec<Contact>>,
    groups: Mutex<Vec<GroupInfo>>,
    pictures: Mutex<HashMap<String, String>>,
}

impl MockEngine {
    /// Own identity used by every mock engine.
    pub const OWN_JID: &'static str = "15550000000:7@s.whatsapp.net";

    pub fn new() -> Self {
        Self {
            handler: OnceLock::new(),
            own_jid: Jid::parse(Self::OWN_JID).unwrap_or_else(|_| Jid::new("15550000000", "s.whatsapp.net")),
            auto_connect: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_contacts: AtomicBool::new(false),
            fail_groups: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            contacts: Mutex::new(Vec::new()),
            groups: Mutex::new(Vec::new()),
            pictures: Mutex::new(HashMap::new()),
        }
    }

    /// Deliver `event` through the registered handler.
    ///
    /// Returns `false` when no handler has been registered.
    pub async fn emit(&self, event: EngineEvent) -> bool {
        match self.handler.get() {
            Some(handler) => {
                handler.handle(event).await;
                true
            }
            None => false,
        }
    }

    /// Emit `Connected` from inside `connect()`.
    pub fn set_auto_connect(&self, enabled: bool) {
        self.auto_connect.store(enabled, Ordering::SeqCst);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_contacts(&self, fail: bool) {
        self.fail_contacts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_groups(&self, fail: bool) {
        self.fail_groups.store(fail, Ordering::SeqCst);
    }

    pub async fn add_contact(&self, contact: Contact) {
        self.contacts.lock().await.push(contact);
    }

    pub async fn add_group(&self, group: GroupInfo) {
        self.groups.lock().await.push(group);
    }

    pub async fn set_profile_picture(&self, jid: &Jid, url: &str) {
        self.pictures
            .lock()
            .await
            .insert(jid.to_non_device().to_string(), url.to_string());
    }

    /// Every `(recipient, text)` passed to `send_text` that succeeded.
    pub async fn sent_messages(&self) -> Vec<(Jid, String)> {
        self.sent.lock().await.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.get().is_some()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn set_event_handler(&self, handler: Arc<dyn EngineEventHandler>) {
        let _ = self.handler.set(handler);
    }

    async fn connect(&self) -> Result<(), EngineError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(EngineError::Protocol("mock handshake failed".into()));
        }
        if self.auto_connect.load(Ordering::SeqCst) {
            self.emit(EngineEvent::Connected).await;
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn own_jid(&self) -> Option<Jid> {
        Some(self.own_jid.clone())
    }

    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, EngineError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(EngineError::Protocol("mock send rejected".into()));
        }
        self.sent.lock().await.push((to.clone(), text.to_string()));
        Ok(SendReceipt {
            id: format!("mock-msg-{}", uuid::Uuid::new_v4()),
        })
    }

    async fn contacts(&self) -> Result<Vec<Contact>, EngineError> {
        if self.fail_contacts.load(Ordering::SeqCst) {
            return Err(EngineError::Storage("mock contact store unavailable".into()));
        }
        Ok(self.contacts.lock().await.clone())
    }

    async fn contact(&self, jid: &Jid) -> Result<Contact, EngineError> {
        let wanted = jid.to_non_device();
        self.contacts
            .lock()
            .await
            .iter()
            .find(|contact| contact.jid.as_ref() == Some(&wanted))
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("contact {wanted}")))
    }

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, EngineError> {
        if self.fail_groups.load(Ordering::SeqCst) {
            return Err(EngineError::Protocol("mock group listing failed".into()));
        }
        Ok(self.groups.lock().await.clone())
    }

    async fn group_info(&self, jid: &Jid) -> Result<GroupInfo, EngineError> {
        if self.fail_groups.load(Ordering::SeqCst) {
            return Err(EngineError::Protocol("mock group info failed".into()));
        }
        self.groups
            .lock()
            .await
            .iter()
            .find(|group| &group.jid == jid)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("group {jid}")))
    }

    async fn profile_picture(&self, jid: &Jid) -> Result<ProfilePicture, EngineError> {
        self.pictures
            .lock()
            .await
            .get(&jid.to_non_device().to_string())
            .map(|url| ProfilePicture { url: url.clone() })
            .ok_or_else(|| EngineError::NotFound(format!("profile picture for {jid}")))
    }
}

/// Factory producing [`MockEngine`]s and recording which state file each was opened on.
#[derive(Default)]
pub struct MockEngineFactory {
    engines: Mutex<Vec<(PathBuf, Arc<MockEngine>)>>,
    auto_connect: AtomicBool,
    fail_open: AtomicBool,
}

impl MockEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engines opened from now on emit `Connected` during `connect()`.
    pub fn set_auto_connect(&self, enabled: bool) {
        self.auto_connect.store(enabled, Ordering::SeqCst);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub async fn opened_count(&self) -> usize {
        self.engines.lock().await.len()
    }

    pub async fn last_engine(&self) -> Option<Arc<MockEngine>> {
        self.engines
            .lock()
            .await
            .last()
            .map(|(_, engine)| Arc::clone(engine))
    }

    /// Engine whose state file sits in the directory named `session_id`.
    pub async fn engine_for_session(&self, session_id: &str) -> Option<Arc<MockEngine>> {
        self.engines
            .lock()
            .await
            .iter()
            .find(|(path, _)| {
                path.parent()
                    .and_then(Path::file_name)
                    .is_some_and(|name| name == session_id)
            })
            .map(|(_, engine)| Arc::clone(engine))
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn open(&self, state_path: &Path) -> Result<Arc<dyn Engine>, EngineError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(EngineError::Storage(format!(
                "mock open failed for {}",
                state_path.display()
            )));
        }
        if !tokio::fs::try_exists(state_path).await.unwrap_or(false) {
            tokio::fs::File::create(state_path)
                .await
                .map_err(|err| EngineError::Storage(err.to_string()))?;
        }

        let engine = Arc::new(MockEngine::new());
        engine.set_auto_connect(self.auto_connect.load(Ordering::SeqCst));
        self.engines
            .lock()
            .await
            .push((state_path.to_path_buf(), Arc::clone(&engine)));
        Ok(engine)
    }
}
