// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Unknown keys are checked against [`SECTION_KEYS`]: a key that belongs to
//! another section (or was written above every header) points at its home
//! section, anything else gets a Jaro-Winkler "did you mean?" suggestion.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::model::SECTION_KEYS;

/// Minimum Jaro-Winkler similarity for a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// An unknown key was found in the configuration.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(cadence::config::unknown_key),
        help(
            "{}",
            unknown_key_help(key, section.as_deref(), *home_section, suggestion.as_deref(), valid_keys)
        )
    )]
    UnknownKey {
        key: String,
        /// Section the key was found in; `None` above the first header.
        section: Option<String>,
        /// Section that does accept the key, when it is not `section`.
        home_section: Option<&'static str>,
        /// Closest valid key, if any is close enough.
        suggestion: Option<String>,
        /// Comma-separated valid keys for the section.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(cadence::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// A value parsed but is semantically invalid.
    #[error("validation error: {message}")]
    #[diagnostic(code(cadence::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(cadence::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

fn unknown_key_help(
    key: &str,
    section: Option<&str>,
    home_section: Option<&str>,
    suggestion: Option<&str>,
    valid_keys: &str,
) -> String {
    match (home_section, section, suggestion) {
        (Some(home), Some(section), _) => {
            format!("`{key}` is a [{home}] setting, not a [{section}] one")
        }
        (Some(home), None, _) => {
            format!("`{key}` is a [{home}] setting; put it under a [{home}] header")
        }
        (None, _, Some(s)) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        (None, _, None) => format!("valid keys: {valid_keys}"),
    }
}

/// The section that accepts `key`, skipping `current`.
///
/// `enabled` and `api_base` live in more than one section, so they never
/// point anywhere.
pub fn home_section(key: &str, current: Option<&str>) -> Option<&'static str> {
    let mut homes = SECTION_KEYS
        .iter()
        .filter(|(section, keys)| Some(*section) != current && keys.contains(&key))
        .map(|(section, _)| *section);
    match (homes.next(), homes.next()) {
        (Some(home), None) => Some(home),
        _ => None,
    }
}

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let section = error.path.first().filter(|s| *s != field).cloned();
                let (span, src) = find_source_span(&error, section.as_deref(), field, toml_sources);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    home_section: home_section(field, section.as_deref()),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    section,
                    span,
                    src,
                }
            }
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn find_source_span(
    error: &figment::error::Error,
    section: Option<&str>,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(path)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let path = path.display().to_string();
    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` in TOML `content`.
///
/// Only the body of `[section]` is searched, up to the next header; with no
/// section, only the lines above the first header.
pub fn find_key_offset(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let mut in_scope = section.is_none();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header.split(']').next().unwrap_or_default().trim();
            in_scope = section == Some(name);
        } else if in_scope
            && let Some(after) = trimmed.strip_prefix(field)
            && after.trim_start().starts_with('=')
        {
            return Some(offset + line.len() - trimmed.len());
        }
        offset += line.len();
    }
    None
}

/// Best valid key above the similarity threshold, if any.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        if handler.render_report(&mut buf, error).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_keys() {
        let valid = &["batch_limit", "max_concurrency", "send_timeout_secs", "claim_lease_secs"];
        assert_eq!(suggest_key("batch_limt", valid), Some("batch_limit".to_string()));
        assert_eq!(
            suggest_key("max_concurency", valid),
            Some("max_concurrency".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", &["host", "port", "job_secret"]), None);
    }

    #[test]
    fn keys_from_other_sections_point_home() {
        assert_eq!(home_section("claim_lease_secs", Some("storage")), Some("dispatcher"));
        assert_eq!(home_section("port", None), Some("gateway"));
        assert_eq!(home_section("port", Some("gateway")), None);
        // Shared by [sms] and [whatsapp].
        assert_eq!(home_section("api_base", Some("gateway")), None);
        assert_eq!(home_section("api_base", Some("sms")), Some("whatsapp"));
        assert_eq!(home_section("nonsense", None), None);
    }

    #[test]
    fn misplaced_key_help_names_its_section() {
        let error = ConfigError::UnknownKey {
            key: "port".to_string(),
            section: Some("storage".to_string()),
            home_section: Some("gateway"),
            suggestion: None,
            valid_keys: "database_path, wal_mode".to_string(),
            span: None,
            src: None,
        };
        let help = error.help().unwrap().to_string();
        assert_eq!(help, "`port` is a [gateway] setting, not a [storage] one");
    }

    #[test]
    fn find_key_offset_stays_inside_the_section() {
        let content = "[storage]\nwal_mode = true\n\n[gateway]\nprot = 80\n";
        let offset = find_key_offset(content, Some("gateway"), "prot").unwrap();
        assert_eq!(&content[offset..offset + 4], "prot");
        assert_eq!(find_key_offset(content, Some("storage"), "prot"), None);
    }

    #[test]
    fn find_key_offset_top_level_stops_at_first_header() {
        let content = "port = 1\n[gateway]\nhost = \"x\"\n";
        assert_eq!(find_key_offset(content, None, "port"), Some(0));
        assert_eq!(find_key_offset(content, None, "host"), None);
    }

    #[test]
    fn find_key_offset_requires_whole_key() {
        let content = "[gateway]\nport_range = 1\n";
        assert_eq!(find_key_offset(content, Some("gateway"), "port"), None);
    }
}
