// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway over the session registry.
//!
//! Every route is a thin adapter: extract path and body, call into the
//! [`SessionRegistry`](textpilot_session::SessionRegistry) or a
//! [`Session`](textpilot_session::Session), and render the result or a
//! structured [`ApiError`].

pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::ApiError;
pub use server::{build_router, start_server, GatewayState, HealthState, ServerConfig};
