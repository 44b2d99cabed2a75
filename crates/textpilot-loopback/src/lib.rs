// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback engine for running TextPilot without a real messaging network.
//!
//! Each session's state file is a SQLite database holding the paired device
//! identity, the contact roster, and group metadata. Pairing is simulated
//! with a generated QR payload, and sent messages are echoed back as inbound
//! messages from the recipient.

pub mod engine;
pub mod migrations;
pub mod store;

pub use engine::{LoopbackEngine, LoopbackFactory};
pub use store::LoopbackStore;
