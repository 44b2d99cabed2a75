// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events transport for a [`Bridge`].
//!
//! Each envelope becomes one frame:
//! ```text
//! event: message
//! data: {"sessionId":"...","type":"message","data":{...}}
//! ```
//! Idle connections get periodic keep-alive comments.

use std::convert::Infallible;

use axum::http::{header, HeaderMap};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use textpilot_core::types::EventEnvelope;
use textpilot_session::Bridge;

/// Whether the request's `Accept` header admits `text/event-stream`.
///
/// A missing header accepts anything.
pub fn accepts_event_stream(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(header::ACCEPT) else {
        return true;
    };
    let Ok(accept) = accept.to_str() else {
        return false;
    };
    accept.split(',').any(|range| {
        let media = range.split(';').next().unwrap_or_default().trim();
        media.eq_ignore_ascii_case("text/event-stream")
            || media.eq_ignore_ascii_case("text/*")
            || media == "*/*"
    })
}

fn to_event(envelope: &EventEnvelope) -> Option<Event> {
    match Event::default()
        .event(envelope.kind.as_str())
        .json_data(envelope)
    {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::error!(
                session_id = envelope.session_id.as_str(),
                kind = envelope.kind.as_str(),
                error = %err,
                "failed to encode event envelope"
            );
            None
        }
    }
}

/// Wraps a bridge as an SSE response body.
pub fn event_stream(bridge: Bridge) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = bridge
        .into_stream()
        .filter_map(|envelope| futures::future::ready(to_event(&envelope).map(Ok)));
    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_accept(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn missing_accept_is_allowed() {
        assert!(accepts_event_stream(&HeaderMap::new()));
    }

    #[test]
    fn explicit_and_wildcard_ranges_are_allowed() {
        assert!(accepts_event_stream(&with_accept("text/event-stream")));
        assert!(accepts_event_stream(&with_accept("text/*;q=0.5")));
        assert!(accepts_event_stream(&with_accept("application/json, */*;q=0.1")));
    }

    #[test]
    fn json_only_is_rejected() {
        assert!(!accepts_event_stream(&with_accept("application/json")));
        assert!(!accepts_event_stream(&with_accept("text/html, application/xml")));
    }
}
