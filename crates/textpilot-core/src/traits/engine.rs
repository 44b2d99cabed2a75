// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary to the external messaging-protocol engine.
//!
//! The engine (handshake, encryption, multi-device sync, device store) is a
//! black box. The gateway only sees the [`Engine`] handle, the
//! [`EngineEventHandler`] callback it registers on that handle, and the
//! closed [`EngineEvent`] enum the callback receives.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EngineError;
use crate::jid::Jid;

/// Body of an inbound message as delivered by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    /// Plain conversation text.
    pub conversation: Option<String>,
    /// Extended text body (replies, link previews).
    pub extended_text: Option<String>,
}

impl MessageBody {
    /// Primary body, falling back to the extended text when the primary is empty.
    pub fn text(&self) -> &str {
        match self.conversation.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => self.extended_text.as_deref().unwrap_or_default(),
        }
    }
}

/// A message received (or echoed from another own device) by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub chat: Jid,
    pub sender: Jid,
    pub is_from_me: bool,
    pub body: MessageBody,
}

/// Events pushed by the engine through [`EngineEventHandler::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A pairing challenge; `codes` are successive QR payloads.
    Qr { codes: Vec<String> },
    Message(InboundMessage),
    Connected,
    Disconnected,
    LoggedOut { reason: Option<String> },
    /// Any engine event the gateway does not translate (receipts, presence, history sync).
    Other { kind: String },
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub id: String,
}

/// A roster entry from the engine's contact store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    pub jid: Option<Jid>,
    pub push_name: Option<String>,
    pub full_name: Option<String>,
    pub business_name: Option<String>,
}

/// A member of a group as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParticipant {
    pub jid: Jid,
    pub is_admin: bool,
}

/// Group metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub jid: Jid,
    pub name: String,
    pub topic: Option<String>,
    pub participants: Vec<GroupParticipant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePicture {
    pub url: String,
}

/// Callback through which an engine delivers its events.
///
/// Invoked from the engine's own tasks. Implementations may await (the
/// session's bounded queue applies backpressure here) but must not perform
/// unrelated blocking I/O.
#[async_trait]
pub trait EngineEventHandler: Send + Sync + 'static {
    async fn handle(&self, event: EngineEvent);
}

/// Handle to one protocol engine instance, exclusively owned by a session.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Registers the event callback. Called once, before [`Engine::connect`].
    fn set_event_handler(&self, handler: Arc<dyn EngineEventHandler>);

    /// Runs the connection handshake. Pairing challenges and the final
    /// connected event arrive through the event handler.
    async fn connect(&self) -> Result<(), EngineError>;

    async fn disconnect(&self);

    /// The paired device identity, if any.
    fn own_jid(&self) -> Option<Jid>;

    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt, EngineError>;

    async fn contacts(&self) -> Result<Vec<Contact>, EngineError>;

    async fn contact(&self, jid: &Jid) -> Result<Contact, EngineError>;

    async fn joined_groups(&self) -> Result<Vec<GroupInfo>, EngineError>;

    async fn group_info(&self, jid: &Jid) -> Result<GroupInfo, EngineError>;

    async fn profile_picture(&self, jid: &Jid) -> Result<ProfilePicture, EngineError>;
}

/// Constructs engines bound to a durable state file.
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    /// Opens (creating if missing) the engine state at `state_path`.
    async fn open(&self, state_path: &Path) -> Result<Arc<dyn Engine>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_prefers_conversation() {
        let body = MessageBody {
            conversation: Some("primary".into()),
            extended_text: Some("extended".into()),
        };
        assert_eq!(body.text(), "primary");
    }

    #[test]
    fn body_falls_back_to_extended_text() {
        let body = MessageBody {
            conversation: Some(String::new()),
            extended_text: Some("quoted reply".into()),
        };
        assert_eq!(body.text(), "quoted reply");

        let body = MessageBody {
            conversation: None,
            extended_text: Some("link preview".into()),
        };
        assert_eq!(body.text(), "link preview");
    }

    #[test]
    fn empty_body_is_empty_text() {
        assert_eq!(MessageBody::default().text(), "");
    }
}
