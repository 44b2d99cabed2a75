// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of [`GatewayError`] as HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use textpilot_core::error::GatewayError;

/// Body of every error response: `{"error": {"code", "message"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Handler error: a [`GatewayError`] that renders itself.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = err.code();

        if status.is_server_error() {
            tracing::error!(error.code = code, status = status.as_u16(), error = ?err, "request failed");
        } else {
            tracing::warn!(error.code = code, status = status.as_u16(), error = %err, "request rejected");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: err.public_message(),
            },
        };
        (status, Json(body)).into_response()
    }
}
