// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle management for the TextPilot gateway.
//!
//! A [`Session`] owns one engine handle, a bounded event queue, and a
//! [`MessageCache`]. The [`SessionRegistry`] tracks live sessions by id and
//! restores them from disk at startup. A [`Bridge`] drains one session's
//! queue for one viewer.

pub mod bridge;
pub mod cache;
pub mod normalize;
pub mod registry;
pub mod session;
pub mod shutdown;

pub use bridge::Bridge;
pub use cache::MessageCache;
pub use normalize::normalize;
pub use registry::{RegistryConfig, ReloadSummary, SessionRegistry, SessionSummary};
pub use session::{Session, SessionOptions, SessionState};
pub use shutdown::install_signal_handler;
