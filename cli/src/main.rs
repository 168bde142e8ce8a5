// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # helm CLI
//!
//! Operator entry point of the helm decision core.
//!
//! ## Commands
//!
//! - `helm decide --request <file>` - Run one decision and print the response
//! - `helm evolve` - Run the strategy evolution pipeline once
//! - `helm backfill` - Embed episodes stored without a vector
//! - `helm outcome --episode <id> --quality <q>` - Record a real-world outcome
//! - `helm run` - Run the evolution scheduler and backfill loop until Ctrl-C
//! - `helm config show|validate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use helm_cli::commands::{self, parse_duration, ConfigCommand, LogFormat};

/// helm decision core - intelligence-enhanced planning decisions
#[derive(Parser)]
#[command(name = "helm")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "HELM_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "HELM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "HELM_LOG_FORMAT", value_enum, default_value = "compact")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one decision request and print the response JSON
    Decide {
        /// Decision request as JSON
        #[arg(short, long, value_name = "FILE")]
        request: PathBuf,
    },

    /// Run the strategy evolution pipeline once
    Evolve {
        /// Smallest outcome quality of a supporting episode
        #[arg(long)]
        min_quality: Option<f64>,

        /// How far back to look for episodes (e.g. "30d")
        #[arg(long, value_parser = parse_duration)]
        lookback: Option<Duration>,

        /// Episodes required before a pattern becomes a strategy
        #[arg(long)]
        min_episodes: Option<usize>,
    },

    /// Embed episodes that were stored without a vector
    Backfill {
        /// Only consider episodes created inside this window (e.g. "7d")
        #[arg(long, value_parser = parse_duration)]
        window: Option<Duration>,
    },

    /// Record the real-world outcome of a decision episode
    Outcome {
        /// Episode id
        #[arg(long)]
        episode: uuid::Uuid,

        /// Outcome quality in [0, 1]
        #[arg(long)]
        quality: f64,

        /// Outcome payload as JSON
        #[arg(long, default_value = "{}")]
        outcome: String,
    },

    /// Run the evolution scheduler and embedding backfill until Ctrl-C
    Run,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Decide { request } => commands::decide::execute(cli.config, request).await,
        Commands::Evolve {
            min_quality,
            lookback,
            min_episodes,
        } => commands::evolve::execute(cli.config, min_quality, lookback, min_episodes).await,
        Commands::Backfill { window } => commands::backfill::execute(cli.config, window).await,
        Commands::Outcome {
            episode,
            quality,
            outcome,
        } => commands::outcome::execute(cli.config, episode, quality, &outcome).await,
        Commands::Run => commands::run::execute(cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
