// SPDX-FileCopyrightText: 2026 TextPilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns Figment failures into miette diagnostics.
//!
//! Unknown keys get a "did you mean" hint (Jaro-Winkler via `strsim`) and,
//! when the offending TOML file is known, a labelled span pointing at the key.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Below this similarity no correction is offered.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// One configuration problem, renderable with miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(textpilot::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest valid key, if any is close enough.
        suggestion: Option<String>,
        /// Comma-separated keys accepted at this position.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(textpilot::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `sessions.event_queue_capacity`.
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(textpilot::config::missing_key),
        help("set `{key}` in textpilot.toml")
    )]
    MissingKey { key: String },

    #[error("validation error: {message}")]
    #[diagnostic(code(textpilot::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(textpilot::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(key) => format!("did you mean `{key}`? accepted keys: {valid_keys}"),
        None => format!("accepted keys: {valid_keys}"),
    }
}

/// `(display name, content)` pairs for the TOML files that fed a Figment.
type Sources<'a> = &'a [(String, String)];

/// Converts every error carried by `err` into a [`ConfigError`].
pub fn figment_to_config_errors(err: figment::Error, toml_sources: Sources<'_>) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::Error, sources: Sources<'_>) -> ConfigError {
    let section = error.path.first().map(String::as_str);

    match &error.kind {
        Kind::UnknownField(key, accepted) => {
            let (span, src) = locate(error, sources, section, key);
            ConfigError::UnknownKey {
                key: key.clone(),
                suggestion: suggest_key(key, accepted),
                valid_keys: accepted.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(key) => ConfigError::MissingKey {
            key: dotted(&error.path, Some(key.as_ref())),
        },
        Kind::InvalidType(found, expected) => {
            // For `sessions.event_queue_capacity` the key is the last path
            // segment and its table is the first.
            let (span, src) = match error.path.split_last() {
                Some((key, rest)) => locate(error, sources, rest.first().map(String::as_str), key),
                None => (None, None),
            };
            ConfigError::InvalidType {
                key: dotted(&error.path, None),
                found: found.to_string(),
                expected: expected.clone(),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

fn dotted(path: &[String], leaf: Option<&str>) -> String {
    path.iter()
        .map(String::as_str)
        .chain(leaf)
        .collect::<Vec<_>>()
        .join(".")
}

/// Picks the source the error came from and finds `key` inside `section`.
fn locate(
    error: &figment::Error,
    sources: Sources<'_>,
    section: Option<&str>,
    key: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let file = error
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.source.as_ref())
        .and_then(|source| source.file_path())
        .map(|path| path.display().to_string());

    let source = match file {
        Some(path) => sources.iter().find(|(name, _)| *name == path),
        // Inline strings carry no file path; a single source is unambiguous.
        None if sources.len() == 1 => sources.first(),
        None => None,
    };

    let Some((name, content)) = source else {
        return (None, None);
    };
    match find_key_offset(content, section, key) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), key.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `key` as an assignment inside table `section`.
///
/// `None` for `section` means the root table (before any header). Dotted
/// and inline tables are not handled.
pub fn find_key_offset(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim_start();

        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().map(str::trim);
            continue;
        }
        if current != section {
            continue;
        }

        let Some(rest) = trimmed.strip_prefix(key) else {
            continue;
        };
        if rest.trim_start().starts_with('=') {
            return Some(start + (line.len() - trimmed.len()));
        }
    }
    None
}

/// Closest entry of `valid_keys` to `unknown`, if similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|candidate| (strsim::jaro_winkler(unknown, candidate), *candidate))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Renders one error as miette's graphical report.
pub fn render_to_string(error: &ConfigError) -> String {
    let mut out = String::new();
    match GraphicalReportHandler::new().render_report(&mut out, error) {
        Ok(()) => out,
        Err(_) => format!("Error: {error}\n"),
    }
}

/// Writes every error to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    for error in errors {
        eprint!("{}", render_to_string(error));
    }
}
