// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use helm_cortex::domain::{CortexConfig, StorageBackend};

use super::load_config;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (file, defaults and environment)
    Show {
        /// Print the full configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: --config)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { yaml } => show(config_override, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
    }
}

async fn show(config_path: Option<PathBuf>, yaml: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;

    if yaml {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();
    print_summary(&config);

    Ok(())
}

fn print_summary(config: &CortexConfig) {
    println!("{}", "Storage:".bold());
    match &config.storage {
        StorageBackend::InMemory => println!("  Backend: in-memory ({})", "data is lost on exit".dimmed()),
        StorageBackend::PostgreSQL(pg) => {
            println!("  Backend: postgres");
            println!("  Max connections: {}", pg.max_connections);
        }
    }
    println!();

    println!("{}", "Collaborators:".bold());
    println!("  Embedding provider: {:?}", config.embedding.provider);
    println!("    Endpoint: {}", config.embedding.url);
    println!("    Model: {} ({} dimensions)", config.embedding.model, config.embedding.dimensions);
    println!(
        "  Analytics: {}",
        config.analytics.url.as_deref().unwrap_or("(disabled)")
    );
    println!();

    println!("{}", "Decision:".bold());
    println!("  Soft budget: {:?}", config.decision.soft_budget);
    println!(
        "  Timeouts: retrieval {:?}, matching {:?}, analytics {:?}",
        config.retrieval.timeout, config.matching.timeout, config.analytics.timeout
    );
    println!(
        "  Gate: confidence >= {}, evidence >= {}",
        config.gate.confidence_threshold, config.gate.min_evidence
    );
    println!();

    println!("{}", "Evolution:".bold());
    println!("  Interval: {:?}", config.evolution.interval);
    println!("  Min outcome quality: {}", config.evolution.min_outcome_quality);
    println!("  Lookback window: {:?}", config.evolution.lookback_window);
    println!("  Min episodes per pattern: {}", config.evolution.min_episodes_per_pattern);
    println!();
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = load_config(config_path.as_deref())?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}
