// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cadence - patient reminder service.
//!
//! This is the binary entry point. `serve` runs the HTTP job endpoints and
//! the optional in-process ticker; `build` and `dispatch` run a single tick
//! for cron-style deployments.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config_cmd;
mod jobs;
mod pipeline;
mod serve;
mod shutdown;
mod status;
mod ticker;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// Cadence - patient reminder service.
#[derive(Parser, Debug)]
#[command(name = "cadence", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP job endpoints and, if enabled, the in-process ticker.
    Serve,
    /// Enqueue reminders for due-soon and overdue assignments once.
    Build {
        /// Evaluate as of this RFC 3339 instant instead of now.
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<DateTime<Utc>>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Send ready reminders once.
    Dispatch {
        /// Maximum items to claim (defaults to dispatcher.batch_limit).
        #[arg(long)]
        limit: Option<usize>,
        /// Evaluate as of this RFC 3339 instant instead of now.
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<DateTime<Utc>>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show queue counts and gateway health.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Inspect the effective configuration.
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the merged configuration as TOML, secrets redacted.
    Show,
    /// Load and validate the configuration, then exit.
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => cadence_config::load_and_validate_path(path),
        None => cadence_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            cadence_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Build { at, json }) => jobs::run_build(&config, at, json).await,
        Some(Commands::Dispatch { limit, at, json }) => {
            jobs::run_dispatch(&config, limit, at, json).await
        }
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Config { action }) => match action {
            Some(ConfigCommands::Show) | None => config_cmd::run_show(&config),
            Some(ConfigCommands::Validate) => {
                config_cmd::run_validate(&config);
                Ok(())
            }
        },
        None => {
            println!("cadence: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("cadence: {e}");
        std::process::exit(1);
    }
}
