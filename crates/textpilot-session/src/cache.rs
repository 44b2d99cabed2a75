// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session message cache.
//!
//! Holds every message sent or received during the session's lifetime,
//! keyed by message identifier. No eviction and no persistence.

use std::collections::HashMap;

use textpilot_core::types::Message;
use tokio::sync::RwLock;

/// Concurrent map from message id to message record.
#[derive(Debug, Default)]
pub struct MessageCache {
    messages: RwLock<HashMap<String, Message>>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `message`, replacing any record with the same id.
    pub async fn put(&self, message: Message) {
        let mut messages = self.messages.write().await;
        messages.insert(message.id.clone(), message);
    }

    /// Looks up a message; a missing id is `None`, never an error.
    pub async fn get(&self, id: &str) -> Option<Message> {
        self.messages.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}
