// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `helm outcome`: attach a real-world outcome to a decision episode.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use uuid::Uuid;

use helm_cortex::domain::EpisodeId;

use super::build_runtime;

pub async fn execute(config_path: Option<PathBuf>, episode: Uuid, quality: f64, outcome: &str) -> Result<()> {
    let outcome: serde_json::Value = serde_json::from_str(outcome).context("--outcome must be valid JSON")?;
    let runtime = build_runtime(config_path).await?;

    let summary = runtime
        .reconciler
        .record_outcome(EpisodeId(episode), outcome, quality)
        .await?;

    println!(
        "{}",
        format!(
            "✓ Outcome recorded for episode {} (quality {:.2}, {} application record(s) resolved)",
            summary.episode_id, summary.outcome_quality, summary.records_resolved
        )
        .green()
    );
    Ok(())
}
