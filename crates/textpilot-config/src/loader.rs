// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./textpilot.toml` > `~/.config/textpilot/textpilot.toml` >
//! `/etc/textpilot/textpilot.toml` with environment variable overrides via the
//! `TEXTPILOT_` prefix, plus the bare `PORT` and `SESSION_DIR` variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TextpilotConfig;

pub(crate) const SYSTEM_CONFIG_FILE: &str = "/etc/textpilot/textpilot.toml";
pub(crate) const LOCAL_CONFIG_FILE: &str = "textpilot.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("textpilot/textpilot.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/textpilot/textpilot.toml` (system-wide)
/// 3. `~/.config/textpilot/textpilot.toml` (user XDG config)
/// 4. `./textpilot.toml` (local directory)
/// 5. `TEXTPILOT_*` environment variables
/// 6. `PORT` and `SESSION_DIR`
pub fn load_config() -> Result<TextpilotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TextpilotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TextpilotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TextpilotConfig, figment::Error> {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(TextpilotConfig::default()))
            .merge(Toml::file(path)),
    )
    .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    with_env(
        Figment::new()
            .merge(Serialized::defaults(TextpilotConfig::default()))
            .merge(Toml::file(SYSTEM_CONFIG_FILE))
            .merge(Toml::file(user_config_path().unwrap_or_default()))
            .merge(Toml::file(LOCAL_CONFIG_FILE)),
    )
}

/// Layer both environment providers on top of `figment`.
pub fn with_env(figment: Figment) -> Figment {
    figment.merge(env_provider()).merge(legacy_env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `TEXTPILOT_SESSIONS_STATE_FILE` must map to
/// `sessions.state_file`, not `sessions.state.file`.
fn env_provider() -> Env {
    Env::prefixed("TEXTPILOT_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("sessions_", "sessions.", 1)
            .replacen("logging_", "logging.", 1);
        mapped.into()
    })
}

/// `PORT` and `SESSION_DIR`, honoured for deployments that predate the prefixed names.
fn legacy_env_provider() -> Env {
    Env::raw()
        .only(&["PORT", "SESSION_DIR"])
        .map(|key| {
            if key == "port" {
                "server.port".into()
            } else if key == "session_dir" {
                "sessions.directory".into()
            } else {
                key.into()
            }
        })
}
