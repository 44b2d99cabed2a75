// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the TextPilot messaging gateway.
//!
//! This crate provides the error taxonomy, identifier parsing, wire records,
//! and the engine boundary traits shared by every other crate in the
//! workspace.

pub mod error;
pub mod jid;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{EngineError, GatewayError};
pub use jid::Jid;
pub use traits::engine::{
    Contact, EngineEvent, GroupInfo, GroupParticipant, InboundMessage, MessageBody,
    ProfilePicture, SendReceipt,
};
pub use traits::{Engine, EngineEventHandler, EngineFactory};
pub use types::{
    Chat, ConnectionStatus, EventEnvelope, EventKind, EventPayload, Message, Participant,
};
