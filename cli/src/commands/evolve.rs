// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `helm evolve`: one run of the strategy evolution pipeline.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use helm_cortex::application::EvolutionParams;
use helm_cortex::domain::EvolutionConfig;

use super::build_runtime;

pub async fn execute(
    config_path: Option<PathBuf>,
    min_quality: Option<f64>,
    lookback: Option<Duration>,
    min_episodes: Option<usize>,
) -> Result<()> {
    let runtime = build_runtime(config_path).await?;
    let params = params(&runtime.config.evolution, min_quality, lookback, min_episodes);

    let summary = runtime
        .pipeline
        .run(params)
        .await
        .context("Strategy evolution failed")?;

    eprintln!("{}", "✓ Strategy evolution completed".green());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Configured parameters with command line overrides applied.
fn params(
    config: &EvolutionConfig,
    min_quality: Option<f64>,
    lookback: Option<Duration>,
    min_episodes: Option<usize>,
) -> EvolutionParams {
    let defaults = EvolutionParams::from_config(config);
    EvolutionParams {
        min_outcome_quality: min_quality.unwrap_or(defaults.min_outcome_quality),
        lookback_window: lookback.unwrap_or(defaults.lookback_window),
        min_episodes_per_pattern: min_episodes.unwrap_or(defaults.min_episodes_per_pattern),
    }
}
