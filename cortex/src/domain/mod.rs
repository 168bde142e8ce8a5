// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer of the decision core: aggregates, value objects, domain
//! events, configuration and the repository/collaborator interfaces.

pub mod adjustment;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod decision;
pub mod episode;
pub mod events;
pub mod memory;
pub mod pattern;
pub mod performance;
pub mod repository;
pub mod strategy;

pub use adjustment::*;
pub use collaborators::*;
pub use config::*;
pub use context::*;
pub use decision::*;
pub use episode::*;
pub use events::*;
pub use memory::*;
pub use pattern::*;
pub use performance::*;
pub use repository::*;
pub use strategy::*;
