// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maps engine events onto the gateway's envelope taxonomy.

use textpilot_core::traits::engine::{EngineEvent, InboundMessage};
use textpilot_core::types::{ConnectionStatus, EventEnvelope, Message};
use tracing::{debug, warn};

/// Converts an engine event into the envelope emitted to viewers.
///
/// Returns `None` for events with no wire representation. Those are dropped,
/// not treated as errors.
pub fn normalize(session_id: &str, event: &EngineEvent) -> Option<EventEnvelope> {
    match event {
        EngineEvent::Qr { codes } => match codes.first() {
            Some(code) => Some(EventEnvelope::qr_code(session_id, code.clone())),
            None => {
                warn!(session_id, "QR event carried no codes, dropping");
                None
            }
        },
        EngineEvent::Message(inbound) => {
            Some(EventEnvelope::message(session_id, to_message(inbound)))
        }
        EngineEvent::Connected => Some(EventEnvelope::status(
            session_id,
            ConnectionStatus::Connected,
        )),
        EngineEvent::Disconnected => Some(EventEnvelope::status(
            session_id,
            ConnectionStatus::Disconnected,
        )),
        EngineEvent::LoggedOut { .. } => Some(EventEnvelope::status(
            session_id,
            ConnectionStatus::LoggedOut,
        )),
        EngineEvent::Other { kind } => {
            debug!(session_id, kind = kind.as_str(), "ignoring engine event");
            None
        }
    }
}

/// Builds the cached message record for an inbound engine message.
pub fn to_message(inbound: &InboundMessage) -> Message {
    Message {
        id: inbound.id.clone(),
        timestamp: inbound.timestamp.timestamp(),
        text: inbound.body.text().to_string(),
        chat_id: inbound.chat.to_string(),
        sender_id: inbound.sender.to_string(),
        is_from_me: inbound.is_from_me,
    }
}
