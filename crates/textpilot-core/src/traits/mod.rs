// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions at the engine seam.
//!
//! Engines are consumed through `#[async_trait]` trait objects so sessions
//! can hold any implementation behind `Arc<dyn Engine>`.

pub mod engine;

pub use engine::{Engine, EngineEventHandler, EngineFactory};
