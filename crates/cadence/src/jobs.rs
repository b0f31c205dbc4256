// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot `cadence build` and `cadence dispatch` commands, for crontab
//! deployments that do not run the HTTP gateway.

use cadence_config::CadenceConfig;
use cadence_core::CadenceError;
use cadence_scheduler::{BuildReport, DispatchReport};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::Pipeline;

/// Run the `cadence build` command.
pub async fn run_build(
    config: &CadenceConfig,
    at: Option<DateTime<Utc>>,
    json: bool,
) -> Result<(), CadenceError> {
    let pipeline = Pipeline::open(config).await?;
    let result = pipeline.builder.build(at.unwrap_or_else(Utc::now)).await;
    pipeline.close().await;

    let report = result?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!("{}", format_build(&report));
    }
    Ok(())
}

/// Run the `cadence dispatch` command.
pub async fn run_dispatch(
    config: &CadenceConfig,
    limit: Option<usize>,
    at: Option<DateTime<Utc>>,
    json: bool,
) -> Result<(), CadenceError> {
    let pipeline = Pipeline::open(config).await?;
    let limit = limit.unwrap_or(pipeline.batch_limit);
    let result = pipeline
        .dispatcher
        .dispatch(at.unwrap_or_else(Utc::now), limit)
        .await;
    pipeline.close().await;

    let report = result?;
    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!("{}", format_dispatch(&report));
    }
    Ok(())
}

fn to_json<T: Serialize>(report: &T) -> Result<String, CadenceError> {
    serde_json::to_string_pretty(report).map_err(|e| CadenceError::Internal(e.to_string()))
}

fn format_build(report: &BuildReport) -> String {
    format!(
        "build: created {}, skipped {}, errors {}",
        report.created, report.skipped, report.errors
    )
}

fn format_dispatch(report: &DispatchReport) -> String {
    format!(
        "dispatch: processed {}, sent {}, failed {} ({} retried), canceled {}, lost {}, errors {}",
        report.processed,
        report.sent,
        report.failed,
        report.retried,
        report.canceled,
        report.lost,
        report.errors
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_summary_lists_every_counter() {
        let report = BuildReport {
            created: 3,
            skipped: 1,
            errors: 0,
        };
        assert_eq!(format_build(&report), "build: created 3, skipped 1, errors 0");
    }

    #[test]
    fn dispatch_summary_lists_every_counter() {
        let report = DispatchReport {
            processed: 5,
            sent: 2,
            failed: 2,
            retried: 1,
            canceled: 1,
            lost: 0,
            errors: 0,
        };
        assert_eq!(
            format_dispatch(&report),
            "dispatch: processed 5, sent 2, failed 2 (1 retried), canceled 1, lost 0, errors 0"
        );
    }

    #[tokio::test]
    async fn one_shot_commands_run_against_a_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CadenceConfig::default();
        config.storage.database_path = dir.path().join("cadence.db").display().to_string();

        run_build(&config, None, true).await.unwrap();
        run_dispatch(&config, Some(5), None, false).await.unwrap();
        assert!(dir.path().join("cadence.db").exists());
    }
}
