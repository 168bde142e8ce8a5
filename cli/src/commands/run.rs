// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `helm run`: background jobs of the decision core.
//!
//! Starts the evolution scheduler and the embedding backfill loop and keeps
//! them running until Ctrl-C.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::build_runtime;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let runtime = build_runtime(config_path).await?;

    let scheduler = runtime.evolution_scheduler();
    let backfill = Arc::clone(&runtime.backfill);
    let tokens = [scheduler.shutdown_token(), backfill.shutdown_token()];

    let handles = [scheduler.start(), backfill.start()];
    info!("helm background jobs running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    for token in &tokens {
        token.cancel();
    }
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background job ended abnormally");
        }
    }

    info!("helm background jobs stopped");
    Ok(())
}
