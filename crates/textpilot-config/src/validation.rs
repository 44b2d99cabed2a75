// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as bind addresses, file names, and queue bounds.

use crate::diagnostic::ConfigError;
use crate::model::TextpilotConfig;

/// Largest accepted per-session event queue.
pub const MAX_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure rather than stopping at the first.
pub fn validate_config(config: &TextpilotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(validation("server.host must not be empty".to_string()));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    for origin in &config.server.cors_allowed_origins {
        if origin.trim().is_empty() {
            errors.push(validation(
                "server.cors_allowed_origins must not contain empty entries".to_string(),
            ));
        }
    }

    if config.sessions.directory.trim().is_empty() {
        errors.push(validation(
            "sessions.directory must not be empty".to_string(),
        ));
    }

    let state_file = config.sessions.state_file.trim();
    if state_file.is_empty() {
        errors.push(validation(
            "sessions.state_file must not be empty".to_string(),
        ));
    } else if state_file.contains(['/', '\\']) || state_file == "." || state_file == ".." {
        errors.push(validation(format!(
            "sessions.state_file `{state_file}` must be a plain file name"
        )));
    }

    let capacity = config.sessions.event_queue_capacity;
    if !(1..=MAX_EVENT_QUEUE_CAPACITY).contains(&capacity) {
        errors.push(validation(format!(
            "sessions.event_queue_capacity must be between 1 and {MAX_EVENT_QUEUE_CAPACITY}, got {capacity}"
        )));
    }

    if config.sessions.backpressure_timeout_secs == 0 {
        errors.push(validation(
            "sessions.backpressure_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validation(message: String) -> ConfigError {
    ConfigError::Validation { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&TextpilotConfig::default()).is_ok());
    }

    #[test]
    fn ipv6_host_is_valid() {
        let mut config = TextpilotConfig::default();
        config.server.host = "::1".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_bad_host() {
        let mut config = TextpilotConfig::default();
        config.server.host = "not a host!".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("server.host"));
    }

    #[test]
    fn rejects_state_file_with_separator() {
        let mut config = TextpilotConfig::default();
        config.sessions.state_file = "nested/session.db".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("plain file name"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = TextpilotConfig::default();
        config.server.host = String::new();
        config.sessions.directory = "  ".into();
        config.sessions.event_queue_capacity = 0;
        config.sessions.backpressure_timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn capacity_upper_bound() {
        let mut config = TextpilotConfig::default();
        config.sessions.event_queue_capacity = MAX_EVENT_QUEUE_CAPACITY;
        assert!(validate_config(&config).is_ok());
        config.sessions.event_queue_capacity = MAX_EVENT_QUEUE_CAPACITY + 1;
        assert!(validate_config(&config).is_err());
    }
}
