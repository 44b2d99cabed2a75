// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the TextPilot gateway.
//!
//! [`GatewayError`] is the request-facing taxonomy: every variant carries a
//! stable code and an HTTP-equivalent status class so transports can render
//! it without inspecting messages. [`EngineError`] is what protocol engines
//! return across the [`Engine`](crate::traits::Engine) boundary.

use thiserror::Error;

/// Boxed source error carried by wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type returned by request-facing gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No session is registered under the given identifier.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// A session with this identifier is already registered.
    #[error("session already exists: {session_id}")]
    SessionAlreadyExists { session_id: String },

    /// The request was malformed (bad JSON body, missing or empty fields).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A recipient or chat identifier could not be parsed.
    #[error("invalid JID `{jid}`: {reason}")]
    InvalidJid { jid: String, reason: String },

    /// The engine rejected or failed a send. Never retried automatically.
    #[error("send failed: {message}")]
    SendFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The session exists but holds no message with this identifier.
    #[error("message not found: {message_id}")]
    MessageNotFound { message_id: String },

    /// The engine has no contact or group for this chat identifier.
    #[error("chat not found: {chat_id}")]
    ChatNotFound { chat_id: String },

    /// The transport cannot carry a long-lived event stream for this request.
    #[error("streaming unsupported: {0}")]
    StreamingUnsupported(String),

    /// Unexpected failure (storage I/O, engine construction).
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl GatewayError {
    /// Build an [`GatewayError::Internal`] that wraps a source error.
    pub fn internal(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        GatewayError::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            GatewayError::SessionAlreadyExists { .. } => "SESSION_ALREADY_EXISTS",
            GatewayError::InvalidRequest(_) => "INVALID_REQUEST",
            GatewayError::InvalidJid { .. } => "INVALID_JID",
            GatewayError::SendFailed { .. } => "SEND_FAILED",
            GatewayError::MessageNotFound { .. } => "MESSAGE_NOT_FOUND",
            GatewayError::ChatNotFound { .. } => "CHAT_NOT_FOUND",
            GatewayError::StreamingUnsupported(_) => "STREAMING_UNSUPPORTED",
            GatewayError::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP-equivalent severity class.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::SessionNotFound { .. }
            | GatewayError::MessageNotFound { .. }
            | GatewayError::ChatNotFound { .. } => 404,
            GatewayError::InvalidRequest(_) | GatewayError::InvalidJid { .. } => 400,
            GatewayError::SessionAlreadyExists { .. } => 409,
            GatewayError::StreamingUnsupported(_) => 406,
            GatewayError::SendFailed { .. } => 502,
            GatewayError::Internal { .. } => 500,
        }
    }

    /// Human-readable summary suitable for API responses.
    ///
    /// Internal errors hide their source chain; it is logged instead.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Internal { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors reported by a protocol engine implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has no live connection (never connected, or disconnected).
    #[error("engine not connected")]
    NotConnected,

    /// The engine has no record of the requested entity.
    #[error("not found: {0}")]
    NotFound(String),

    /// The engine's durable state could not be read or written.
    #[error("engine storage error: {0}")]
    Storage(String),

    /// Any other protocol-level failure.
    #[error("engine protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let cases: Vec<(GatewayError, &str, u16)> = vec![
            (
                GatewayError::SessionNotFound {
                    session_id: "s".into(),
                },
                "SESSION_NOT_FOUND",
                404,
            ),
            (
                GatewayError::SessionAlreadyExists {
                    session_id: "s".into(),
                },
                "SESSION_ALREADY_EXISTS",
                409,
            ),
            (
                GatewayError::InvalidRequest("bad".into()),
                "INVALID_REQUEST",
                400,
            ),
            (
                GatewayError::InvalidJid {
                    jid: "x".into(),
                    reason: "y".into(),
                },
                "INVALID_JID",
                400,
            ),
            (
                GatewayError::SendFailed {
                    message: "nope".into(),
                    source: None,
                },
                "SEND_FAILED",
                502,
            ),
            (
                GatewayError::MessageNotFound {
                    message_id: "m".into(),
                },
                "MESSAGE_NOT_FOUND",
                404,
            ),
            (
                GatewayError::ChatNotFound {
                    chat_id: "c".into(),
                },
                "CHAT_NOT_FOUND",
                404,
            ),
            (
                GatewayError::StreamingUnsupported("no".into()),
                "STREAMING_UNSUPPORTED",
                406,
            ),
            (
                GatewayError::Internal {
                    message: "boom".into(),
                    source: None,
                },
                "INTERNAL_SERVER_ERROR",
                500,
            ),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status, "status for {code}");
        }
    }

    #[test]
    fn internal_hides_source_in_public_message() {
        let err = GatewayError::internal(
            "failed to create session directory",
            std::io::Error::other("disk on fire"),
        );
        assert_eq!(err.public_message(), "failed to create session directory");
        let source = std::error::Error::source(&err).expect("source kept for logging");
        assert!(source.to_string().contains("disk on fire"));
    }

    #[test]
    fn not_found_message_names_the_id() {
        let err = GatewayError::SessionNotFound {
            session_id: "abc".into(),
        };
        assert_eq!(err.public_message(), "session not found: abc");
    }
}
