// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Cadence reminder service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Cadence configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with `CADENCE_*`
/// environment variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CadenceConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Enqueue settings.
    #[serde(default)]
    pub builder: BuilderConfig,

    /// Send settings.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Optional in-process ticker.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// HTTP job endpoints.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Twilio SMS transport.
    #[serde(default)]
    pub sms: SmsConfig,

    /// WhatsApp Cloud API transport.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
}

/// Every section and the keys it accepts, in file order.
pub const SECTION_KEYS: [(&str, &[&str]); 8] = [
    ("service", &["log_level"]),
    ("storage", &["database_path", "wal_mode"]),
    ("builder", &["horizon_hours"]),
    (
        "dispatcher",
        &["batch_limit", "max_concurrency", "send_timeout_secs", "claim_lease_secs"],
    ),
    (
        "schedule",
        &["enabled", "build_interval_secs", "dispatch_interval_secs"],
    ),
    ("gateway", &["enabled", "host", "port", "job_secret"]),
    ("sms", &["account_sid", "auth_token", "from_number", "api_base"]),
    ("whatsapp", &["access_token", "phone_number_id", "api_base"]),
];

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("cadence").join("cadence.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("cadence.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Enqueue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BuilderConfig {
    /// How far ahead of now assignments are enqueued.
    #[serde(default = "default_horizon_hours")]
    pub horizon_hours: u32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            horizon_hours: default_horizon_hours(),
        }
    }
}

fn default_horizon_hours() -> u32 {
    24
}

/// Send configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Maximum queue items claimed per dispatch run.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Maximum concurrent sends within a run.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Deadline for a single send.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// How long a claimed item stays invisible to other dispatchers.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
            max_concurrency: default_max_concurrency(),
            send_timeout_secs: default_send_timeout_secs(),
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

impl DispatcherConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }
}

fn default_batch_limit() -> usize {
    50
}

fn default_max_concurrency() -> usize {
    8
}

fn default_send_timeout_secs() -> u64 {
    15
}

fn default_claim_lease_secs() -> u64 {
    300
}

/// In-process ticker for deployments without an external cron.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Run build/dispatch on a timer inside `cadence serve`.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_build_interval_secs")]
    pub build_interval_secs: u64,

    #[serde(default = "default_dispatch_interval_secs")]
    pub dispatch_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            build_interval_secs: default_build_interval_secs(),
            dispatch_interval_secs: default_dispatch_interval_secs(),
        }
    }
}

fn default_build_interval_secs() -> u64 {
    300
}

fn default_dispatch_interval_secs() -> u64 {
    60
}

/// HTTP job endpoint configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP endpoints from `cadence serve`.
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    /// Host to bind to.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind to.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Shared secret expected in the `x-cron-secret` header.
    /// `None` rejects every job request.
    #[serde(default)]
    pub job_secret: Option<String>,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("job_secret", &redacted(&self.job_secret))
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            job_secret: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3710
}

/// Twilio SMS configuration. The transport is enabled when all
/// credentials are present.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number in E.164 form.
    #[serde(default)]
    pub from_number: Option<String>,

    #[serde(default = "default_sms_api_base")]
    pub api_base: String,
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redacted(&self.auth_token))
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base: default_sms_api_base(),
        }
    }
}

impl SmsConfig {
    pub fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }
}

fn default_sms_api_base() -> String {
    "https://api.twilio.com".to_string()
}

/// WhatsApp Cloud API configuration. The transport is enabled when all
/// credentials are present.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub phone_number_id: Option<String>,

    #[serde(default = "default_whatsapp_api_base")]
    pub api_base: String,
}

impl fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("access_token", &redacted(&self.access_token))
            .field("phone_number_id", &self.phone_number_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            api_base: default_whatsapp_api_base(),
        }
    }
}

impl WhatsAppConfig {
    pub fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.phone_number_id.is_some()
    }
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com/v21.0".to_string()
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "[REDACTED]")
}
