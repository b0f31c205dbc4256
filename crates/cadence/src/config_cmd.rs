// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `cadence config` command implementation.

use cadence_config::CadenceConfig;
use cadence_core::CadenceError;

const REDACTED: &str = "[REDACTED]";

/// Print the merged configuration as TOML.
pub fn run_show(config: &CadenceConfig) -> Result<(), CadenceError> {
    print!("{}", render_redacted(config)?);
    Ok(())
}

/// Configuration was already loaded and validated before dispatch.
pub fn run_validate(config: &CadenceConfig) {
    println!(
        "cadence: configuration is valid (database: {})",
        config.storage.database_path
    );
}

fn render_redacted(config: &CadenceConfig) -> Result<String, CadenceError> {
    let mut shown = config.clone();
    for secret in [
        &mut shown.gateway.job_secret,
        &mut shown.sms.auth_token,
        &mut shown.whatsapp.access_token,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    toml::to_string_pretty(&shown).map_err(|e| CadenceError::Internal(e.to_string()))
}
