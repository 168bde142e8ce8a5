// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Confidence Gate
//!
//! The only component allowed to accept a proposed adjustment. A proposal
//! passes iff its confidence reaches the threshold and its evidence volume
//! reaches the configured minimum.

use crate::domain::adjustment::{GateVerdict, ProposedAdjustment};
use crate::domain::config::GateConfig;

pub struct ConfidenceGate {
    confidence_threshold: f64,
    min_evidence: usize,
}

impl ConfidenceGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            min_evidence: config.min_evidence,
        }
    }

    pub fn evaluate(&self, proposal: &ProposedAdjustment) -> GateVerdict {
        let confident = proposal.confidence >= self.confidence_threshold;
        let supported = proposal.evidence_volume >= self.min_evidence;

        let verdict = match (confident, supported) {
            (true, true) => GateVerdict {
                accepted: true,
                reason: format!(
                    "confidence {:.2} >= {:.2} with evidence {} >= {}",
                    proposal.confidence, self.confidence_threshold, proposal.evidence_volume, self.min_evidence
                ),
            },
            (false, _) => GateVerdict {
                accepted: false,
                reason: format!(
                    "confidence {:.2} below threshold {:.2}",
                    proposal.confidence, self.confidence_threshold
                ),
            },
            (true, false) => GateVerdict {
                accepted: false,
                reason: format!(
                    "evidence volume {} below minimum {}",
                    proposal.evidence_volume, self.min_evidence
                ),
            },
        };

        let outcome = if verdict.accepted { "accepted" } else { "rejected" };
        metrics::counter!("helm_gate_decisions_total", "outcome" => outcome).increment(1);
        verdict
    }
}

impl Default for ConfidenceGate {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}
