// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for TextPilot integration tests.
//!
//! Provides a scriptable engine and harness infrastructure for fast,
//! deterministic, CI-runnable tests without a real messaging network.
//!
//! # Components
//!
//! - [`MockEngine`] - Engine with scriptable events and failure injection
//! - [`MockEngineFactory`] - Factory recording every engine it opens
//! - [`TestHarness`] - Registry over mock engines in a temp directory

pub mod harness;
pub mod mock_engine;

pub use harness::{drain, next_envelope, wait_for_state, TestHarness};
pub use mock_engine::{MockEngine, MockEngineFactory};
