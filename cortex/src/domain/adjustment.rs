// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Adjustments and the Per-Field Decision State Machine
//!
//! ```text
//! BASELINE ──propose──▶ PROPOSED ──accept──▶ ACCEPTED ──finalize──▶ FINAL (override)
//!     │                     └─────reject──▶ REJECTED ──finalize──▶ FINAL (baseline)
//!     └──────────────finalize───────────────────────────────────▶ FINAL (baseline)
//! ```
//!
//! The only path to a final value that differs from the baseline runs through
//! `PROPOSED` and an explicit `accept`, which only the confidence gate calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::decision::DecisionField;
use super::episode::EpisodeId;
use super::pattern::EvidenceSource;
use super::strategy::StrategyId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceReferences {
    pub strategy_ids: Vec<StrategyId>,
    pub episode_ids: Vec<EpisodeId>,
    pub analytics_reference: Option<String>,
}

/// Adjustment proposed by the decision modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAdjustment {
    pub field: DecisionField,
    pub original: f64,
    pub recommended: f64,
    pub confidence: f64,
    pub evidence_volume: usize,
    pub dominant_source: EvidenceSource,
    pub rationale: String,
    pub evidence: EvidenceReferences,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    Baseline,
    Proposed,
    Accepted,
    Rejected,
    Final,
}

#[derive(Debug, Error, PartialEq)]
pub enum DecisionStateError {
    #[error("field {field} cannot move from {from:?} via {transition}")]
    InvalidTransition {
        field: DecisionField,
        from: FieldState,
        transition: &'static str,
    },

    #[error("proposal for {proposal} submitted to field {field}")]
    FieldMismatch {
        field: DecisionField,
        proposal: DecisionField,
    },
}

/// Outcome of the confidence gate for one adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub accepted: bool,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct FieldDecision {
    field: DecisionField,
    baseline: f64,
    state: FieldState,
    /// State before finalization; kept for reporting.
    resolved_state: FieldState,
    proposal: Option<ProposedAdjustment>,
    verdict_reason: Option<String>,
    final_value: Option<f64>,
}

impl FieldDecision {
    pub fn new(field: DecisionField, baseline: f64) -> Self {
        Self {
            field,
            baseline,
            state: FieldState::Baseline,
            resolved_state: FieldState::Baseline,
            proposal: None,
            verdict_reason: None,
            final_value: None,
        }
    }

    pub fn field(&self) -> DecisionField {
        self.field
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    pub fn verdict_reason(&self) -> Option<&str> {
        self.verdict_reason.as_deref()
    }

    pub fn final_value(&self) -> Option<f64> {
        self.final_value
    }

    /// True when the field reached FINAL through ACCEPTED.
    pub fn is_overridden(&self) -> bool {
        self.state == FieldState::Final && self.resolved_state == FieldState::Accepted
    }

    fn invalid(&self, transition: &'static str) -> DecisionStateError {
        DecisionStateError::InvalidTransition {
            field: self.field,
            from: self.state,
            transition,
        }
    }

    pub fn propose(&mut self, proposal: ProposedAdjustment) -> Result<(), DecisionStateError> {
        if self.state != FieldState::Baseline {
            return Err(self.invalid("propose"));
        }
        if proposal.field != self.field {
            return Err(DecisionStateError::FieldMismatch {
                field: self.field,
                proposal: proposal.field,
            });
        }
        self.proposal = Some(proposal);
        self.state = FieldState::Proposed;
        Ok(())
    }

    pub fn apply_verdict(&mut self, verdict: GateVerdict) -> Result<(), DecisionStateError> {
        if self.state != FieldState::Proposed {
            return Err(self.invalid(if verdict.accepted { "accept" } else { "reject" }));
        }
        self.state = if verdict.accepted { FieldState::Accepted } else { FieldState::Rejected };
        self.verdict_reason = Some(verdict.reason);
        Ok(())
    }

    /// Fix the final value. A proposal that was never gated cannot be
    /// finalized.
    pub fn finalize(&mut self) -> Result<f64, DecisionStateError> {
        let value = match (self.state, &self.proposal) {
            (FieldState::Accepted, Some(p)) => p.recommended,
            (FieldState::Baseline, _) | (FieldState::Rejected, _) => self.baseline,
            _ => return Err(self.invalid("finalize")),
        };
        self.resolved_state = self.state;
        self.state = FieldState::Final;
        self.final_value = Some(value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> ProposedAdjustment {
        ProposedAdjustment {
            field: DecisionField::TaskCount,
            original: 8.0,
            recommended: 6.0,
            confidence: 0.82,
            evidence_volume: 3,
            dominant_source: EvidenceSource::Episode,
            rationale: "3 similar episodes".to_string(),
            evidence: EvidenceReferences::default(),
        }
    }

    #[test]
    fn test_accepted_proposal_overrides() {
        let mut d = FieldDecision::new(DecisionField::TaskCount, 8.0);
        d.propose(proposal()).unwrap();
        d.apply_verdict(GateVerdict { accepted: true, reason: "ok".into() }).unwrap();
        assert_eq!(d.finalize().unwrap(), 6.0);
        assert!(d.is_overridden());
    }

    #[test]
    fn test_rejected_proposal_keeps_baseline() {
        let mut d = FieldDecision::new(DecisionField::TaskCount, 8.0);
        d.propose(proposal()).unwrap();
        d.apply_verdict(GateVerdict { accepted: false, reason: "low".into() }).unwrap();
        assert_eq!(d.finalize().unwrap(), 8.0);
        assert!(!d.is_overridden());
        assert_eq!(d.verdict_reason(), Some("low"));
    }

    #[test]
    fn test_ungated_proposal_cannot_finalize() {
        let mut d = FieldDecision::new(DecisionField::TaskCount, 8.0);
        d.propose(proposal()).unwrap();
        assert!(matches!(
            d.finalize(),
            Err(DecisionStateError::InvalidTransition { from: FieldState::Proposed, .. })
        ));
    }

    #[test]
    fn test_baseline_finalizes_to_baseline() {
        let mut d = FieldDecision::new(DecisionField::DurationDays, 10.0);
        assert_eq!(d.finalize().unwrap(), 10.0);
        assert_eq!(d.state(), FieldState::Final);
        assert!(!d.is_overridden());
    }

    #[test]
    fn test_verdict_without_proposal_is_rejected() {
        let mut d = FieldDecision::new(DecisionField::TaskCount, 8.0);
        let err = d.apply_verdict(GateVerdict { accepted: true, reason: "x".into() });
        assert!(err.is_err());
    }

    #[test]
    fn test_field_mismatch() {
        let mut d = FieldDecision::new(DecisionField::DurationDays, 10.0);
        assert!(matches!(d.propose(proposal()), Err(DecisionStateError::FieldMismatch { .. })));
    }

    #[test]
    fn test_double_proposal_is_invalid() {
        let mut d = FieldDecision::new(DecisionField::TaskCount, 8.0);
        d.propose(proposal()).unwrap();
        assert!(d.propose(proposal()).is_err());
    }
}
