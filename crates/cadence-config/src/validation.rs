// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: non-empty paths, positive limits
//! and intervals, a claim lease long enough for a full batch, a usable bind
//! host, and complete transport credentials.

use crate::diagnostic::ConfigError;
use crate::model::CadenceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every problem instead of failing fast.
pub fn validate_config(config: &CadenceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.service.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.builder.horizon_hours == 0 {
        errors.push(ConfigError::validation(
            "builder.horizon_hours must be at least 1",
        ));
    }

    let dispatcher = &config.dispatcher;
    for (key, value) in [
        ("dispatcher.batch_limit", dispatcher.batch_limit as u64),
        ("dispatcher.max_concurrency", dispatcher.max_concurrency as u64),
        ("dispatcher.send_timeout_secs", dispatcher.send_timeout_secs),
        ("dispatcher.claim_lease_secs", dispatcher.claim_lease_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{key} must be at least 1")));
        }
    }
    if dispatcher.batch_limit > 0 && dispatcher.max_concurrency > 0 && dispatcher.claim_lease_secs > 0 {
        // The last wave of a full batch starts this many timeouts after the claim.
        let waves = dispatcher.batch_limit.div_ceil(dispatcher.max_concurrency) as u64;
        let required = waves.saturating_mul(dispatcher.send_timeout_secs);
        if dispatcher.claim_lease_secs < required {
            errors.push(ConfigError::validation(format!(
                "dispatcher.claim_lease_secs ({}) must be at least {required}: \
                 {waves} send waves (batch_limit {} / max_concurrency {}) of up to {}s each",
                dispatcher.claim_lease_secs,
                dispatcher.batch_limit,
                dispatcher.max_concurrency,
                dispatcher.send_timeout_secs
            )));
        }
    }

    if config.schedule.enabled {
        if config.schedule.build_interval_secs == 0 {
            errors.push(ConfigError::validation(
                "schedule.build_interval_secs must be at least 1",
            ));
        }
        if config.schedule.dispatch_interval_secs == 0 {
            errors.push(ConfigError::validation(
                "schedule.dispatch_interval_secs must be at least 1",
            ));
        }
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }
    if config.gateway.enabled && config.gateway.port == 0 {
        errors.push(ConfigError::validation("gateway.port must not be 0"));
    }
    if config
        .gateway
        .job_secret
        .as_deref()
        .is_some_and(|s| s.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "gateway.job_secret must not be blank; remove it to disable job endpoints",
        ));
    }

    let sms = &config.sms;
    let sms_fields = [
        ("sms.account_sid", sms.account_sid.is_some()),
        ("sms.auth_token", sms.auth_token.is_some()),
        ("sms.from_number", sms.from_number.is_some()),
    ];
    check_all_or_none(&sms_fields, &mut errors);
    check_api_base("sms.api_base", &sms.api_base, &mut errors);

    let whatsapp = &config.whatsapp;
    let whatsapp_fields = [
        ("whatsapp.access_token", whatsapp.access_token.is_some()),
        ("whatsapp.phone_number_id", whatsapp.phone_number_id.is_some()),
    ];
    check_all_or_none(&whatsapp_fields, &mut errors);
    check_api_base("whatsapp.api_base", &whatsapp.api_base, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Credentials of one transport must be given together.
fn check_all_or_none(fields: &[(&str, bool)], errors: &mut Vec<ConfigError>) {
    let present = fields.iter().filter(|(_, set)| *set).count();
    if present == 0 || present == fields.len() {
        return;
    }
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, set)| !*set)
        .map(|(key, _)| *key)
        .collect();
    errors.push(ConfigError::validation(format!(
        "incomplete transport credentials, missing {}",
        missing.join(", ")
    )));
}

fn check_api_base(key: &str, value: &str, errors: &mut Vec<ConfigError>) {
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        errors.push(ConfigError::validation(format!(
            "{key} `{value}` must be an http(s) URL"
        )));
    }
}
