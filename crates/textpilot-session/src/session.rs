// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session lifecycle: one engine handle, one bounded event queue, one message cache.
//!
//! States: Created -> Connecting -> Connected, with Disconnected and LoggedOut
//! reachable from any live state. Both of those enqueue their status envelope
//! and then tear the session down. Closed is terminal.
//!
//! The queue sender lives behind a lock that only [`Session::teardown`] empties.
//! Producers clone the sender under that lock, so a write either lands before
//! the queue closes or observes the closed session and is dropped with a
//! warning. Nothing ever writes to a closed queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use strum::{Display, IntoStaticStr};
use textpilot_core::error::GatewayError;
use textpilot_core::jid::Jid;
use textpilot_core::traits::engine::{Contact, EngineEvent, GroupInfo};
use textpilot_core::traits::{Engine, EngineEventHandler};
use textpilot_core::types::{Chat, ConnectionStatus, EventEnvelope, EventPayload, Message, Participant};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::MessageCache;
use crate::normalize::normalize;

/// Default capacity of a session's event queue.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 100;

/// Default time an enqueue may block before the current viewer is detached.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(30);

/// States in the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Constructed, handshake not started (or a previous handshake failed).
    Created,
    Connecting,
    Connected,
    Disconnected,
    LoggedOut,
    /// Terminal: engine disconnected, queue closed.
    Closed,
}

impl SessionState {
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

/// Tunables for a session's event queue.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub event_queue_capacity: usize,
    pub backpressure_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Receiving half of the event queue, shared by successive viewers.
pub(crate) type SharedReceiver = Arc<Mutex<mpsc::Receiver<EventEnvelope>>>;

/// One tenant's connection to the messaging engine.
pub struct Session {
    id: String,
    engine: Arc<dyn Engine>,
    cache: MessageCache,
    state: watch::Sender<SessionState>,
    sender: Mutex<Option<mpsc::Sender<EventEnvelope>>>,
    receiver: SharedReceiver,
    /// Cancelled once, by teardown.
    closed: CancellationToken,
    torn_down: AtomicBool,
    /// Lease of the viewer currently draining the queue.
    viewer: Mutex<Option<CancellationToken>>,
    backpressure_timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Routes engine callbacks into a session without keeping it alive.
struct SessionEventHandler {
    session: Weak<Session>,
}

#[async_trait]
impl EngineEventHandler for SessionEventHandler {
    async fn handle(&self, event: EngineEvent) {
        match self.session.upgrade() {
            Some(session) => session.on_engine_event(event).await,
            None => debug!("engine event for a dropped session, ignoring"),
        }
    }
}

impl Session {
    /// Creates a session around `engine` and registers itself as the engine's event handler.
    pub fn new(id: impl Into<String>, engine: Arc<dyn Engine>, options: SessionOptions) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(options.event_queue_capacity.max(1));
        let (state, _) = watch::channel(SessionState::Created);

        let session = Arc::new(Self {
            id: id.into(),
            engine,
            cache: MessageCache::new(),
            state,
            sender: Mutex::new(Some(tx)),
            receiver: Arc::new(Mutex::new(rx)),
            closed: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
            viewer: Mutex::new(None),
            backpressure_timeout: options.backpressure_timeout,
        });

        session.engine.set_event_handler(Arc::new(SessionEventHandler {
            session: Arc::downgrade(&session),
        }));
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch channel following every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolves once teardown has started.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }

    /// Starts the engine handshake in the background and returns immediately.
    ///
    /// Only a session in [`SessionState::Created`] starts a handshake; any
    /// other state makes this a no-op. Handshake failures are logged, emitted
    /// as a `connect_failed` status envelope, and return the session to
    /// `Created`. Returns whether a handshake was started.
    pub fn connect(self: &Arc<Self>) -> bool {
        let started = self.state.send_if_modified(|state| {
            if *state == SessionState::Created {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !started {
            debug!(session_id = self.id.as_str(), state = %self.state(), "connect ignored");
            return false;
        }

        info!(session_id = self.id.as_str(), "starting engine connection");
        let session = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = session.engine.connect().await {
                error!(
                    session_id = session.id.as_str(),
                    error = %err,
                    "engine connection failed"
                );
                session.state.send_if_modified(|state| {
                    if *state == SessionState::Connecting {
                        *state = SessionState::Created;
                        true
                    } else {
                        false
                    }
                });
                session
                    .enqueue(EventEnvelope::status(
                        session.id.clone(),
                        ConnectionStatus::ConnectFailed,
                    ))
                    .await;
            }
        });
        true
    }

    /// The engine's single callback entry point: update state, normalize, cache, enqueue.
    pub async fn on_engine_event(&self, event: EngineEvent) {
        let terminal = matches!(
            event,
            EngineEvent::Disconnected | EngineEvent::LoggedOut { .. }
        );

        match &event {
            EngineEvent::Connected => self.transition(SessionState::Connected),
            EngineEvent::Disconnected => self.transition(SessionState::Disconnected),
            EngineEvent::LoggedOut { reason } => {
                info!(
                    session_id = self.id.as_str(),
                    reason = reason.as_deref().unwrap_or("unspecified"),
                    "session logged out"
                );
                self.transition(SessionState::LoggedOut);
            }
            _ => {}
        }

        if let Some(envelope) = normalize(&self.id, &event) {
            if let EventPayload::Message(message) = &envelope.data {
                self.cache.put(message.clone()).await;
            }
            self.enqueue(envelope).await;
        }

        if terminal {
            self.teardown().await;
        }
    }

    /// Disconnects the engine and closes the event queue. Idempotent.
    ///
    /// Viewers already attached drain whatever is still queued and then end.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            debug!(session_id = self.id.as_str(), "teardown already done");
            return;
        }

        self.engine.disconnect().await;
        self.closed.cancel();
        self.sender.lock().await.take();
        self.state.send_replace(SessionState::Closed);
        info!(session_id = self.id.as_str(), "session closed");
    }

    /// Sends a text message and caches it as sent by this session.
    ///
    /// Engine failures become [`GatewayError::SendFailed`]; nothing is retried.
    pub async fn send_text(&self, to: &Jid, text: &str) -> Result<Message, GatewayError> {
        let receipt = self.engine.send_text(to, text).await.map_err(|err| {
            warn!(
                session_id = self.id.as_str(),
                to = %to,
                error = %err,
                "send failed"
            );
            GatewayError::SendFailed {
                message: err.to_string(),
                source: Some(Box::new(err)),
            }
        })?;

        let sender_id = self
            .engine
            .own_jid()
            .map(|jid| jid.to_non_device().to_string())
            .unwrap_or_default();

        let message = Message {
            id: receipt.id,
            timestamp: chrono::Utc::now().timestamp(),
            text: text.to_string(),
            chat_id: to.to_string(),
            sender_id,
            is_from_me: true,
        };
        self.cache.put(message.clone()).await;

        debug!(
            session_id = self.id.as_str(),
            message_id = message.id.as_str(),
            "message sent"
        );
        Ok(message)
    }

    /// Looks up a cached message.
    pub async fn get_message(&self, message_id: &str) -> Result<Message, GatewayError> {
        self.cache
            .get(message_id)
            .await
            .ok_or_else(|| GatewayError::MessageNotFound {
                message_id: message_id.to_string(),
            })
    }

    /// Lists one-to-one contacts and joined groups.
    ///
    /// A failing contact or group listing is logged and contributes nothing.
    pub async fn list_chats(&self) -> Vec<Chat> {
        let mut chats = Vec::new();

        match self.engine.contacts().await {
            Ok(contacts) => {
                for contact in contacts {
                    let Some(jid) = contact.jid.clone() else {
                        continue;
                    };
                    if jid.is_group() {
                        continue;
                    }
                    let name = first_non_empty([&contact.push_name, &contact.full_name])
                        .unwrap_or_else(|| jid.to_string());
                    chats.push(Chat {
                        jid: jid.to_string(),
                        name,
                        pfp: String::new(),
                        is_group: false,
                        description: None,
                        participants: Vec::new(),
                    });
                }
            }
            Err(err) => {
                warn!(session_id = self.id.as_str(), error = %err, "failed to list contacts");
            }
        }

        match self.engine.joined_groups().await {
            Ok(groups) => {
                chats.extend(groups.into_iter().map(|group| Chat {
                    jid: group.jid.to_string(),
                    name: group.name,
                    pfp: String::new(),
                    is_group: true,
                    description: group.topic.filter(|topic| !topic.is_empty()),
                    participants: Vec::new(),
                }));
            }
            Err(err) => {
                warn!(session_id = self.id.as_str(), error = %err, "failed to list joined groups");
            }
        }

        debug!(session_id = self.id.as_str(), count = chats.len(), "chats listed");
        chats
    }

    /// Details for one chat.
    ///
    /// An unknown contact is [`GatewayError::ChatNotFound`]. Profile picture
    /// and group info failures degrade the result instead of failing it.
    pub async fn get_chat(&self, jid: &Jid) -> Result<Chat, GatewayError> {
        let contact = self.engine.contact(jid).await.map_err(|err| {
            warn!(session_id = self.id.as_str(), chat_id = %jid, error = %err, "chat not found");
            GatewayError::ChatNotFound {
                chat_id: jid.to_string(),
            }
        })?;

        let pfp = match self.engine.profile_picture(jid).await {
            Ok(picture) => picture.url,
            Err(err) => {
                warn!(
                    session_id = self.id.as_str(),
                    chat_id = %jid,
                    error = %err,
                    "failed to get profile picture"
                );
                String::new()
            }
        };

        let bare = jid.to_non_device();
        let mut chat = Chat {
            jid: bare.to_string(),
            name: contact_display_name(&contact).unwrap_or_else(|| bare.to_string()),
            pfp,
            is_group: jid.is_group(),
            description: None,
            participants: Vec::new(),
        };

        if chat.is_group {
            match self.engine.group_info(jid).await {
                Ok(group) => apply_group_info(&mut chat, group),
                Err(err) => {
                    error!(
                        session_id = self.id.as_str(),
                        chat_id = %jid,
                        error = %err,
                        "failed to get group info"
                    );
                }
            }
        }

        Ok(chat)
    }

    /// Registers a new viewer, preempting any previous one.
    ///
    /// The returned lease is a child of `shutdown` and is cancelled when a
    /// newer viewer attaches or backpressure detaches this one.
    pub async fn attach_viewer(&self, shutdown: &CancellationToken) -> CancellationToken {
        let lease = shutdown.child_token();
        let mut viewer = self.viewer.lock().await;
        if let Some(previous) = viewer.replace(lease.clone()) {
            debug!(session_id = self.id.as_str(), "preempting previous viewer");
            previous.cancel();
        }
        lease
    }

    pub(crate) fn receiver(&self) -> SharedReceiver {
        Arc::clone(&self.receiver)
    }

    async fn detach_viewer(&self) {
        if let Some(lease) = self.viewer.lock().await.take() {
            lease.cancel();
        }
    }

    /// Moves to `next` unless the session is already closed.
    fn transition(&self, next: SessionState) {
        let changed = self.state.send_if_modified(|state| {
            if state.is_closed() || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(session_id = self.id.as_str(), state = %next, "session state changed");
        }
    }

    /// Places `envelope` on the queue, waiting while it is full.
    ///
    /// Blocking longer than the backpressure timeout detaches the current
    /// viewer and keeps waiting. An enqueue that finds the session closed,
    /// or is still blocked when it closes, drops the envelope with a warning.
    async fn enqueue(&self, envelope: EventEnvelope) {
        let sender = self.sender.lock().await.clone();
        let Some(sender) = sender else {
            warn!(
                session_id = self.id.as_str(),
                kind = envelope.kind.as_str(),
                "late event after teardown dropped"
            );
            return;
        };

        let kind = envelope.kind;
        let send = sender.send(envelope);
        tokio::pin!(send);
        let mut detached = false;

        loop {
            tokio::select! {
                biased;
                _ = self.closed.cancelled() => {
                    warn!(
                        session_id = self.id.as_str(),
                        kind = kind.as_str(),
                        "session closed while enqueue was blocked, event dropped"
                    );
                    return;
                }
                result = &mut send => {
                    if result.is_err() {
                        warn!(session_id = self.id.as_str(), kind = kind.as_str(), "event queue closed, event dropped");
                    }
                    return;
                }
                _ = tokio::time::sleep(self.backpressure_timeout), if !detached => {
                    warn!(
                        session_id = self.id.as_str(),
                        timeout_secs = self.backpressure_timeout.as_secs(),
                        "event queue full, detaching viewer"
                    );
                    self.detach_viewer().await;
                    detached = true;
                }
            }
        }
    }
}

fn first_non_empty<const N: usize>(candidates: [&Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .cloned()
}

fn contact_display_name(contact: &Contact) -> Option<String> {
    first_non_empty([&contact.business_name, &contact.full_name])
}

fn apply_group_info(chat: &mut Chat, group: GroupInfo) {
    chat.name = group.name;
    chat.description = group.topic.filter(|topic| !topic.is_empty());
    chat.participants = group
        .participants
        .into_iter()
        .map(|p| Participant {
            jid: p.jid.to_string(),
            is_admin: p.is_admin,
        })
        .collect();
}
