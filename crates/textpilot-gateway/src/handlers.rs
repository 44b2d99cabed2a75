// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route handlers for the `/clients` API and `/health`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use textpilot_core::error::GatewayError;
use textpilot_core::jid::Jid;
use textpilot_core::types::{Chat, Message};
use textpilot_session::{Bridge, SessionSummary};
use tracing::info;

use crate::error::ApiError;
use crate::server::GatewayState;
use crate::sse;

/// Request body for `POST /clients/{client_id}/messages/send`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub jid: String,
    pub text: String,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub sessions: usize,
}

/// POST /clients/connect
///
/// Returns the new session id as a JSON string; pairing proceeds in the background.
pub async fn connect(State(state): State<GatewayState>) -> Result<Json<String>, ApiError> {
    let session_id = state.registry.create_session().await?;
    info!(session_id = session_id.as_str(), "connect request accepted");
    Ok(Json(session_id))
}

/// GET /clients
pub async fn list_clients(State(state): State<GatewayState>) -> Json<Vec<SessionSummary>> {
    Json(state.registry.list().await)
}

/// GET /clients/{client_id}/events
pub async fn events(
    State(state): State<GatewayState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = state.registry.require(&client_id).await?;
    if !sse::accepts_event_stream(&headers) {
        return Err(GatewayError::StreamingUnsupported(
            "request does not accept text/event-stream".to_string(),
        )
        .into());
    }

    let bridge = Bridge::open(&session, &state.shutdown).await;
    info!(session_id = client_id.as_str(), "event stream opened");
    Ok(sse::event_stream(bridge).into_response())
}

/// POST /clients/{client_id}/disconnect
pub async fn disconnect(
    State(state): State<GatewayState>,
    Path(client_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.registry.close_session(&client_id).await?;
    Ok(Json(MessageResponse {
        message: "Client disconnected successfully".to_string(),
    }))
}

/// POST /clients/{client_id}/messages/send
///
/// The session is resolved before the body is validated, so an unknown
/// client is reported as such even with a malformed body.
pub async fn send_message(
    State(state): State<GatewayState>,
    Path(client_id): Path<String>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let session = state.registry.require(&client_id).await?;
    let Json(request) = body.map_err(|rejection| GatewayError::InvalidRequest(rejection.body_text()))?;

    if request.text.is_empty() {
        return Err(GatewayError::InvalidRequest("text must not be empty".to_string()).into());
    }
    let to = Jid::parse(&request.jid)?;

    let message = session.send_text(&to, &request.text).await?;
    Ok(Json(message))
}

/// GET /clients/{client_id}/messages/{message_id}
pub async fn get_message(
    State(state): State<GatewayState>,
    Path((client_id, message_id)): Path<(String, String)>,
) -> Result<Json<Message>, ApiError> {
    let session = state.registry.require(&client_id).await?;
    Ok(Json(session.get_message(&message_id).await?))
}

/// GET /clients/{client_id}/chats
pub async fn list_chats(
    State(state): State<GatewayState>,
    Path(client_id): Path<String>,
) -> Result<Json<Vec<Chat>>, ApiError> {
    let session = state.registry.require(&client_id).await?;
    Ok(Json(session.list_chats().await))
}

/// GET /clients/{client_id}/chats/{chat_id}
pub async fn get_chat(
    State(state): State<GatewayState>,
    Path((client_id, chat_id)): Path<(String, String)>,
) -> Result<Json<Chat>, ApiError> {
    let session = state.registry.require(&client_id).await?;
    let jid = Jid::parse(&chat_id)?;
    Ok(Json(session.get_chat(&jid).await?))
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        sessions: state.registry.len().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_requires_both_fields() {
        let req: SendMessageRequest =
            serde_json::from_str(r#"{"jid": "1@s.whatsapp.net", "text": "hi"}"#).unwrap();
        assert_eq!(req.jid, "1@s.whatsapp.net");
        assert_eq!(req.text, "hi");

        assert!(serde_json::from_str::<SendMessageRequest>(r#"{"jid": "1@s.whatsapp.net"}"#).is_err());
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 42,
            sessions: 3,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "ok", "version": "0.1.0", "uptime_secs": 42, "sessions": 3})
        );
    }
}
