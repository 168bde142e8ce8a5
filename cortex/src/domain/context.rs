// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Applicability Context
//!
//! Structured snapshot of project and team state used for two things:
//!
//! - matching strategies whose [`ApplicabilityPredicate`] accepts the context,
//! - producing the text that is embedded for episode similarity search.
//!
//! Raw numeric features are bucketed into coarse bands before they take part
//! in a predicate, so that two projects with 5 and 6 engineers share a
//! context signature.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityTrend {
    Increasing,
    Stable,
    Decreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    Discovery,
    Execution,
    Stabilization,
    Closing,
}

/// Team size bucket. Small is 1-3 people, medium 4-7, large 8 and above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSizeBand {
    Small,
    Medium,
    Large,
}

impl TeamSizeBand {
    pub fn from_team_size(size: u32) -> Self {
        match size {
            0..=3 => TeamSizeBand::Small,
            4..=7 => TeamSizeBand::Medium,
            _ => TeamSizeBand::Large,
        }
    }
}

impl fmt::Display for VelocityTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VelocityTrend::Increasing => "increasing",
            VelocityTrend::Stable => "stable",
            VelocityTrend::Decreasing => "decreasing",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ProjectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProjectPhase::Discovery => "discovery",
            ProjectPhase::Execution => "execution",
            ProjectPhase::Stabilization => "stabilization",
            ProjectPhase::Closing => "closing",
        };
        f.write_str(s)
    }
}

impl fmt::Display for TeamSizeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamSizeBand::Small => "small",
            TeamSizeBand::Medium => "medium",
            TeamSizeBand::Large => "large",
        };
        f.write_str(s)
    }
}

/// Project/team state supplied with a decision request.
///
/// Every feature is optional; the external project services may not know all
/// of them for a given project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicabilityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_trend: Option<VelocityTrend>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_phase: Option<ProjectPhase>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backlog_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprint_length_days: Option<u32>,
}

impl ApplicabilityContext {
    pub fn team_size_band(&self) -> Option<TeamSizeBand> {
        self.team_size.map(TeamSizeBand::from_team_size)
    }

    /// Text form of the context used as embedding input.
    ///
    /// Decision episodes and retrieval queries both go through this function
    /// so that their vectors live in the same space.
    pub fn embedding_text(&self, narrative: Option<&str>) -> String {
        let mut parts = Vec::new();

        if let Some(band) = self.team_size_band() {
            parts.push(format!("team {}", band));
        }
        if let Some(size) = self.team_size {
            parts.push(format!("team_size {}", size));
        }
        if let Some(trend) = self.velocity_trend {
            parts.push(format!("velocity {}", trend));
        }
        if let Some(phase) = self.project_phase {
            parts.push(format!("phase {}", phase));
        }
        if let Some(backlog) = self.backlog_size {
            parts.push(format!("backlog {}", backlog));
        }
        if let Some(days) = self.sprint_length_days {
            parts.push(format!("sprint_length {}", days));
        }
        if let Some(text) = narrative.map(str::trim).filter(|t| !t.is_empty()) {
            parts.push(text.to_string());
        }

        parts.join(" | ")
    }
}

/// Applicability conditions of a strategy.
///
/// A `None` feature is unconstrained. A constrained feature that the context
/// contradicts makes the predicate inapplicable; a constrained feature the
/// context does not report counts as a half match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicabilityPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<TeamSizeBand>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_trend: Option<VelocityTrend>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_phase: Option<ProjectPhase>,
}

/// Score given to a predicate with no constrained features.
const UNCONSTRAINED_SCORE: f64 = 0.5;

/// Credit for a constrained feature missing from the context.
const UNKNOWN_FEATURE_CREDIT: f64 = 0.5;

impl ApplicabilityPredicate {
    /// Predicate constraining every feature the context reports.
    pub fn from_context(context: &ApplicabilityContext) -> Self {
        Self {
            team_size: context.team_size_band(),
            velocity_trend: context.velocity_trend,
            project_phase: context.project_phase,
        }
    }

    pub fn constrained_features(&self) -> usize {
        [
            self.team_size.is_some(),
            self.velocity_trend.is_some(),
            self.project_phase.is_some(),
        ]
        .iter()
        .filter(|c| **c)
        .count()
    }

    /// How well `context` satisfies the predicate, in [0,1].
    ///
    /// Returns `None` when any constrained feature is contradicted.
    pub fn evaluate(&self, context: &ApplicabilityContext) -> Option<f64> {
        let constrained = self.constrained_features();
        if constrained == 0 {
            return Some(UNCONSTRAINED_SCORE);
        }

        let mut credit = 0.0;
        credit += feature_credit(self.team_size, context.team_size_band())?;
        credit += feature_credit(self.velocity_trend, context.velocity_trend)?;
        credit += feature_credit(self.project_phase, context.project_phase)?;

        Some((credit / constrained as f64).clamp(0.0, 1.0))
    }

    /// Stable textual key, used to group episodes and deduplicate strategies.
    pub fn signature(&self) -> String {
        fn part<T: fmt::Display>(name: &str, value: Option<T>) -> String {
            match value {
                Some(v) => format!("{}={}", name, v),
                None => format!("{}=*", name),
            }
        }

        [
            part("team", self.team_size),
            part("velocity", self.velocity_trend),
            part("phase", self.project_phase),
        ]
        .join(";")
    }
}

fn feature_credit<T: PartialEq>(constraint: Option<T>, observed: Option<T>) -> Option<f64> {
    match (constraint, observed) {
        (None, _) => Some(0.0),
        (Some(_), None) => Some(UNKNOWN_FEATURE_CREDIT),
        (Some(c), Some(o)) if c == o => Some(1.0),
        (Some(_), Some(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ApplicabilityContext {
        ApplicabilityContext {
            team_size: Some(5),
            velocity_trend: Some(VelocityTrend::Decreasing),
            project_phase: Some(ProjectPhase::Execution),
            backlog_size: Some(40),
            sprint_length_days: Some(14),
        }
    }

    #[test]
    fn test_team_size_bands() {
        assert_eq!(TeamSizeBand::from_team_size(1), TeamSizeBand::Small);
        assert_eq!(TeamSizeBand::from_team_size(4), TeamSizeBand::Medium);
        assert_eq!(TeamSizeBand::from_team_size(7), TeamSizeBand::Medium);
        assert_eq!(TeamSizeBand::from_team_size(12), TeamSizeBand::Large);
    }

    #[test]
    fn test_full_match_scores_one() {
        let predicate = ApplicabilityPredicate::from_context(&context());
        assert_eq!(predicate.evaluate(&context()), Some(1.0));
    }

    #[test]
    fn test_contradiction_is_inapplicable() {
        let predicate = ApplicabilityPredicate {
            project_phase: Some(ProjectPhase::Closing),
            ..Default::default()
        };
        assert_eq!(predicate.evaluate(&context()), None);
    }

    #[test]
    fn test_unknown_feature_gets_partial_credit() {
        let predicate = ApplicabilityPredicate {
            team_size: Some(TeamSizeBand::Medium),
            velocity_trend: Some(VelocityTrend::Decreasing),
            ..Default::default()
        };
        let partial = ApplicabilityContext {
            team_size: Some(6),
            ..Default::default()
        };
        assert_eq!(predicate.evaluate(&partial), Some(0.75));
    }

    #[test]
    fn test_unconstrained_predicate() {
        let predicate = ApplicabilityPredicate::default();
        assert_eq!(predicate.evaluate(&context()), Some(0.5));
        assert_eq!(predicate.signature(), "team=*;velocity=*;phase=*");
    }

    #[test]
    fn test_signature_is_stable_for_same_bands() {
        let a = ApplicabilityContext { team_size: Some(5), ..context() };
        let b = ApplicabilityContext { team_size: Some(6), ..context() };
        assert_eq!(
            ApplicabilityPredicate::from_context(&a).signature(),
            ApplicabilityPredicate::from_context(&b).signature()
        );
    }

    #[test]
    fn test_embedding_text_includes_narrative() {
        let text = context().embedding_text(Some("  release crunch "));
        assert!(text.contains("team medium"));
        assert!(text.contains("phase execution"));
        assert!(text.ends_with("release crunch"));
    }
}
