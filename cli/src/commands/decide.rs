// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `helm decide`: run one decision request against the configured backends.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use helm_cortex::domain::{CortexEvent, DecisionRequest};

use super::build_runtime;

pub async fn execute(config_path: Option<PathBuf>, request_path: PathBuf) -> Result<()> {
    let request = read_request(&request_path)?;
    let runtime = build_runtime(config_path).await?;

    let mut events = runtime.event_bus.subscribe();
    let response = runtime.decisions.decide(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    // the episode is logged in the background; let it land before exit
    let wait = runtime.config.logger.embedding_timeout * 2;
    let logged = tokio::time::timeout(wait, async {
        while let Ok(event) = events.recv().await {
            if let CortexEvent::EpisodeLogged { episode_id, .. } = event {
                return Some(episode_id);
            }
        }
        None
    })
    .await;
    match logged {
        Ok(Some(episode_id)) => info!(episode_id = %episode_id, "Decision episode persisted"),
        _ => warn!("Decision episode was not persisted before exit"),
    }

    Ok(())
}

fn read_request(path: &Path) -> Result<DecisionRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read decision request {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid decision request in {:?}", path))
}
