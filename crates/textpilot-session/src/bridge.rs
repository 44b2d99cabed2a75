// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-viewer consumer that drains a session's event queue.
//!
//! A bridge yields an opening `buffer` envelope, a `logged_in` replay when the
//! session is already connected, and then queued envelopes in FIFO order. It
//! ends when its lease is cancelled (viewer preempted, backpressure detach,
//! or process shutdown) or when teardown has closed the queue and the queue
//! is drained. Ending a bridge never tears the session down.
//!
//! The queue lock is held only while a read is in flight, so a viewer that
//! stops polling cannot keep its successor from draining the queue.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::Stream;
use textpilot_core::types::{ConnectionStatus, EventEnvelope};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::session::{Session, SessionState, SharedReceiver};

/// Event stream bound to one session and one viewer.
#[derive(Debug)]
pub struct Bridge {
    session_id: String,
    preamble: VecDeque<EventEnvelope>,
    receiver: SharedReceiver,
    lease: CancellationToken,
}

impl Bridge {
    /// Attaches a new viewer to `session`, preempting any previous viewer.
    pub async fn open(session: &Arc<Session>, shutdown: &CancellationToken) -> Self {
        let lease = session.attach_viewer(shutdown).await;

        let mut preamble = VecDeque::with_capacity(2);
        preamble.push_back(EventEnvelope::buffer(session.id()));
        if session.state() == SessionState::Connected {
            preamble.push_back(EventEnvelope::status(
                session.id(),
                ConnectionStatus::LoggedIn,
            ));
        }

        debug!(session_id = session.id(), "event stream opened");
        Self {
            session_id: session.id().to_string(),
            preamble,
            receiver: session.receiver(),
            lease,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Cancels this bridge; the next read returns `None`.
    pub fn close(&self) {
        self.lease.cancel();
    }

    /// Next envelope, or `None` once the stream is over.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if self.lease.is_cancelled() {
            return None;
        }
        if let Some(envelope) = self.preamble.pop_front() {
            return Some(envelope);
        }

        let mut receiver = tokio::select! {
            biased;
            _ = self.lease.cancelled() => return None,
            receiver = self.receiver.lock() => receiver,
        };
        tokio::select! {
            biased;
            _ = self.lease.cancelled() => None,
            envelope = receiver.recv() => envelope,
        }
    }

    /// Converts the bridge into a `Stream` for transports.
    pub fn into_stream(self) -> impl Stream<Item = EventEnvelope> + Send + 'static {
        futures::stream::unfold(self, |mut bridge| async move {
            let envelope = bridge.next().await?;
            Some((envelope, bridge))
        })
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        debug!(session_id = self.session_id.as_str(), "event stream closed");
    }
}
