// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `cadence status` command implementation.
//!
//! Reads queue counts straight from the database and probes the gateway
//! health endpoint. A gateway that is not running is reported, not an error.

use std::io::IsTerminal;
use std::time::Duration;

use cadence_config::CadenceConfig;
use cadence_core::types::QueueStatusCounts;
use cadence_core::{CadenceError, HealthStatus, PluginAdapter, QueueRepository, StorageAdapter};
use cadence_storage::SqliteStore;
use serde::{Deserialize, Serialize};

/// Health endpoint response from the gateway.
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub database: String,
    pub storage: String,
    pub queue: QueueStatusCounts,
    pub gateway: GatewayStatus,
}

#[derive(Debug, Serialize)]
pub struct GatewayStatus {
    pub endpoint: String,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Run the `cadence status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &CadenceConfig, json: bool, plain: bool) -> Result<(), CadenceError> {
    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    let counts = store.status_counts().await;
    let storage = describe_health(store.health_check().await?);
    store.close().await?;

    let report = StatusReport {
        database: config.storage.database_path.clone(),
        storage,
        queue: counts?,
        gateway: probe_gateway(config).await,
    };

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CadenceError::Internal(e.to_string()))?;
        println!("{out}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&report, use_color);
    }
    Ok(())
}

fn describe_health(health: HealthStatus) -> String {
    match health {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

async fn probe_gateway(config: &CadenceConfig) -> GatewayStatus {
    let endpoint = format!("http://{}:{}/health", config.gateway.host, config.gateway.port);
    let offline = |endpoint: String| GatewayStatus {
        endpoint,
        running: false,
        status: None,
        version: None,
    };

    if !config.gateway.enabled {
        return offline(endpoint);
    }
    let Ok(client) = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    else {
        return offline(endpoint);
    };

    // A 503 still carries a health body.
    match client.get(&endpoint).send().await {
        Ok(resp) => match resp.json::<HealthResponse>().await {
            Ok(health) => GatewayStatus {
                endpoint,
                running: true,
                status: Some(health.status),
                version: Some(health.version),
            },
            Err(_) => offline(endpoint),
        },
        Err(_) => offline(endpoint),
    }
}

fn print_status(report: &StatusReport, use_color: bool) {
    use colored::Colorize;

    println!();
    println!("  cadence status");
    println!("  {}", "-".repeat(35));
    println!("    Database: {}", report.database);
    println!("    Storage:  {}", report.storage);

    let gateway = &report.gateway;
    match (&gateway.status, use_color) {
        (Some(status), true) => println!("    Gateway:  {} {status}", "✓".green()),
        (Some(status), false) => println!("    Gateway:  [OK] {status}"),
        (None, true) => println!("    Gateway:  {} {}", "✗".red(), "not running".red()),
        (None, false) => println!("    Gateway:  [FAIL] not running"),
    }
    println!("    Endpoint: {}", gateway.endpoint);

    let queue = &report.queue;
    println!();
    println!("  queue ({} total)", queue.total());
    println!("  {}", "-".repeat(35));
    for (label, count) in [
        ("scheduled", queue.scheduled),
        ("retrying", queue.retrying),
        ("sent", queue.sent),
        ("failed", queue.failed),
        ("canceled", queue.canceled),
    ] {
        if use_color && label == "failed" && count > 0 {
            println!("    {label:<10} {}", count.to_string().red());
        } else {
            println!("    {label:<10} {count}");
        }
    }
    println!();
}
