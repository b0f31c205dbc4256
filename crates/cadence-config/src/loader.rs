// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./cadence.toml` > `~/.config/cadence/cadence.toml` > `/etc/cadence/cadence.toml`
//! with environment variable overrides via `CADENCE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::{CadenceConfig, SECTION_KEYS};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/cadence/cadence.toml";
pub const LOCAL_CONFIG_PATH: &str = "cadence.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/cadence/cadence.toml` (system-wide)
/// 3. `~/.config/cadence/cadence.toml` (user XDG config)
/// 4. `./cadence.toml` (local directory)
/// 5. `CADENCE_*` environment variables
pub fn load_config() -> Result<CadenceConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CadenceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CadenceConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CadenceConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CadenceConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CadenceConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// `~/.config/cadence/cadence.toml`, if a config dir exists on this platform.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("cadence").join("cadence.toml"))
}

/// Environment provider with explicit section mapping.
///
/// Keys contain underscores (`job_secret`, `send_timeout_secs`), so the
/// prefix is split off by section name rather than on every `_`:
/// `CADENCE_GATEWAY_JOB_SECRET` becomes `gateway.job_secret`.
fn env_provider() -> Env {
    Env::prefixed("CADENCE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for (section, _) in SECTION_KEYS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
