// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level records shared by the session layer and transports.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// A cached text message, sent or received.
///
/// Immutable once inserted into a session's message cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub text: String,
    pub chat_id: String,
    pub sender_id: String,
    pub is_from_me: bool,
}

/// A one-to-one chat or a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub jid: String,
    pub name: String,
    /// Profile picture URL; empty when unavailable.
    #[serde(default)]
    pub pfp: String,
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<Participant>,
}

/// A member of a group chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub jid: String,
    pub is_admin: bool,
}

/// The closed set of envelope types emitted on an event stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// Connection-liveness handshake, always the first envelope of a stream.
    Buffer,
    QrCode,
    Message,
    Status,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Values carried by `status` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    LoggedOut,
    /// Replay of current state for a viewer attaching to a connected session.
    LoggedIn,
    /// The engine handshake failed; the session can be connected again.
    ConnectFailed,
}

/// Envelope payload: a bare string, a status value, or a message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Status(ConnectionStatus),
    Text(String),
    Message(Message),
}

/// The unit written to an event stream, one per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: EventPayload,
}

impl EventEnvelope {
    /// The empty `buffer` envelope that opens every stream.
    pub fn buffer(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            kind: EventKind::Buffer,
            data: EventPayload::Text(String::new()),
        }
    }

    pub fn status(session_id: impl Into<String>, status: ConnectionStatus) -> Self {
        Self {
            session_id: session_id.into(),
            kind: EventKind::Status,
            data: EventPayload::Status(status),
        }
    }

    pub fn qr_code(session_id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            kind: EventKind::QrCode,
            data: EventPayload::Text(code.into()),
        }
    }

    pub fn message(session_id: impl Into<String>, message: Message) -> Self {
        Self {
            session_id: session_id.into(),
            kind: EventKind::Message,
            data: EventPayload::Message(message),
        }
    }
}
