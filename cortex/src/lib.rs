// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Helm Cortex
//!
//! Intelligence-driven decision core. A rule-based baseline decision is
//! enriched with evidence from three sources (matched strategies, similar
//! past episodes and project analytics), and an adjustment is applied only
//! when it clears a confidence gate. Every decision is logged as an episode;
//! a batch evolution pipeline mines successful episodes into strategies and
//! retunes strategy confidence from observed outcomes.
//!
//! # Architecture
//!
//! - **domain:** aggregates (`Episode`, `Strategy`, `StrategyApplicationRecord`),
//!   evidence and adjustment value objects, repository and collaborator traits
//! - **application:** `DecisionService`, `EpisodeLogger`, `OutcomeReconciler`,
//!   `EmbeddingBackfill` and the `evolution` pipeline
//! - **infrastructure:** in-memory and PostgreSQL stores, embedding and
//!   analytics HTTP clients, the event bus

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{CortexRuntime, DecisionService};
pub use domain::*;
pub use infrastructure::*;
