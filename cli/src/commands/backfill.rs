// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `helm backfill`: one embedding backfill pass.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use super::build_runtime;

pub async fn execute(config_path: Option<PathBuf>, window: Option<Duration>) -> Result<()> {
    let runtime = build_runtime(config_path).await?;
    let window = window.unwrap_or(runtime.config.backfill.window);

    let summary = runtime.backfill.run_once(window).await?;

    let line = format!(
        "{} pending, {} embedded, {} failed",
        summary.pending, summary.embedded, summary.failed
    );
    if summary.failed > 0 {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.green());
    }
    Ok(())
}
