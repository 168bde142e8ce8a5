// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the helm CLI

pub mod backfill;
pub mod config;
pub mod decide;
pub mod evolve;
pub mod outcome;
pub mod run;

pub use self::config::ConfigCommand;

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use std::time::Duration;

use helm_cortex::application::CortexRuntime;
use helm_cortex::domain::CortexConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Parse a humantime duration such as `"300ms"`, `"1h"` or `"30d"`.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(value).map_err(|e| e.to_string())
}

/// Load configuration from `path` (defaults when absent) with environment
/// overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<CortexConfig> {
    CortexConfig::load(path).context("Failed to load configuration")
}

/// Load, validate and wire the decision core.
pub async fn build_runtime(config_path: Option<PathBuf>) -> Result<CortexRuntime> {
    let config = load_config(config_path.as_deref())?;
    CortexRuntime::build(config).await
}
